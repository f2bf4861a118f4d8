//! Compile command - persist a compiled artifact without rendering

use crate::context::engine_from_config;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub fn run(
    config_path: &Path,
    template: String,
    compile_id: Option<String>,
    verbose: bool,
) -> Result<()> {
    let engine = engine_from_config(config_path)?;

    if verbose {
        println!("{} Compiling '{}'", "→".cyan(), template);
    }

    let path = engine.compile_template(&template, compile_id.as_deref())?;
    println!(
        "{} Compiled '{}' to {}",
        "✓".green().bold(),
        template,
        path.display()
    );
    Ok(())
}
