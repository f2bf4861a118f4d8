//! CLI command structure using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stencil")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the engine configuration file
    #[arg(short, long, global = true, default_value = "stencil.toml")]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a template and print the output
    Render {
        /// Template spec, e.g. "page.tpl" or "string:Hello {$name}"
        template: String,

        /// Assign a variable as NAME=VALUE; VALUE is parsed as JSON when
        /// possible and kept as a plain string otherwise
        #[arg(long = "var", value_name = "NAME=VALUE")]
        var: Vec<String>,

        /// Assign variables from a JSON object, inline or @file
        #[arg(long, value_name = "JSON")]
        vars_json: Option<String>,

        /// Mark a variable as nocache (re-evaluated on every cached request)
        #[arg(long = "nocache-var", value_name = "NAME")]
        nocache_var: Vec<String>,

        /// Cache scope, dotted segments become directories
        #[arg(long)]
        cache_id: Option<String>,

        /// Compile scope for per-variant compiled artifacts
        #[arg(long)]
        compile_id: Option<String>,

        /// Cache lifetime in seconds for this request; negative never expires
        #[arg(long)]
        lifetime: Option<i64>,
    },

    /// Compile a template to its artifact without rendering
    Compile {
        /// Template spec
        template: String,

        /// Compile scope for per-variant compiled artifacts
        #[arg(long)]
        compile_id: Option<String>,
    },

    /// Cache maintenance
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Delete cached render output
    Clear {
        /// Only entries for this template name
        #[arg(long)]
        name: Option<String>,

        /// Only entries under this cache scope
        #[arg(long)]
        cache_id: Option<String>,

        /// Only entries under this compile scope
        #[arg(long)]
        compile_id: Option<String>,

        /// Only entries older than this many seconds
        #[arg(long)]
        max_age: Option<u64>,
    },
}
