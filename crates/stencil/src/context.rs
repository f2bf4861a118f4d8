//! Engine setup shared by CLI commands

use anyhow::{Context as _, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use stencil_core::{Engine, EngineConfig};

/// Load the engine configuration and build an [`Engine`] from it.
///
/// Relative directories in the configuration are resolved against the
/// directory containing the configuration file, so a project can be
/// rendered from any working directory.
pub fn engine_from_config(config_path: &Path) -> Result<Engine> {
    let text = fs::read_to_string(config_path)
        .map_err(|e| anyhow!("Cannot read '{}': {}", config_path.display(), e))?;
    let mut config = EngineConfig::from_toml_str(&text)
        .with_context(|| format!("Invalid configuration in '{}'", config_path.display()))?;

    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    for dir in &mut config.template_dirs {
        *dir = rebase(base, dir);
    }
    for dir in &mut config.trusted_dirs {
        *dir = rebase(base, dir);
    }
    config.compile_dir = rebase(base, &config.compile_dir);
    config.cache_dir = rebase(base, &config.cache_dir);

    Ok(Engine::new(config))
}

fn rebase(base: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        base.join(dir)
    }
}
