//! Cache maintenance commands

use crate::context::engine_from_config;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use stencil_core::ClearFilter;

pub fn run_clear(
    config_path: &Path,
    name: Option<String>,
    cache_id: Option<String>,
    compile_id: Option<String>,
    max_age: Option<u64>,
    verbose: bool,
) -> Result<()> {
    let engine = engine_from_config(config_path)?;

    let filter = ClearFilter {
        name,
        cache_id,
        compile_id,
        max_age,
    };
    if verbose {
        println!("{} Clearing cache entries", "→".cyan());
    }

    let deleted = engine.clear_cache(&filter)?;
    println!("{} Deleted {} cache entries", "✓".green().bold(), deleted);
    Ok(())
}
