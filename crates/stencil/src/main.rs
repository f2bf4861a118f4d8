mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use cli::{CacheCommands, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // RUST_LOG controls engine-internal logging; -v defaults it to debug
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Render {
            template,
            var,
            vars_json,
            nocache_var,
            cache_id,
            compile_id,
            lifetime,
        } => commands::render::run(
            &cli.config,
            template,
            var,
            vars_json,
            nocache_var,
            cache_id,
            compile_id,
            lifetime,
            cli.verbose,
        ),
        Commands::Compile {
            template,
            compile_id,
        } => commands::compile::run(&cli.config, template, compile_id, cli.verbose),
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Clear {
                name,
                cache_id,
                compile_id,
                max_age,
            } => commands::cache::run_clear(
                &cli.config,
                name,
                cache_id,
                compile_id,
                max_age,
                cli.verbose,
            ),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
