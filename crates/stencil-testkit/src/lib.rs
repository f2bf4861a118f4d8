//! Test utilities for stencil
//!
//! This crate provides shared testing utilities used across the stencil workspace.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Creates a temporary directory within `.tmp/` at the project root
///
/// This ensures all test temporary files are centralized in a single location
/// that is gitignored and easy to clean up manually if needed.
///
/// # Panics
///
/// Panics if the current directory cannot be determined or the temporary
/// directory cannot be created.
pub fn temp_dir_in_workspace() -> TempDir {
    let workspace_root = std::env::current_dir().expect("Failed to get current directory");

    let tmp_base = workspace_root.join(".tmp");

    // Ensure .tmp/ exists
    fs::create_dir_all(&tmp_base).expect("Failed to create .tmp directory");

    // Create unique subdirectory within .tmp/
    TempDir::new_in(&tmp_base).expect("Failed to create temporary directory in .tmp/")
}

/// A throwaway template project: a template directory, working directories
/// for compiled artifacts and cached output, and a `stencil.toml` tying
/// them together.
pub struct ProjectDirs {
    root: TempDir,
    pub templates: PathBuf,
    pub compiled: PathBuf,
    pub cache: PathBuf,
}

impl ProjectDirs {
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.path().join("stencil.toml")
    }

    /// Write a template file under the template directory, creating
    /// intermediate directories for names like `partials/header.tpl`.
    pub fn write_template(&self, name: &str, content: &str) -> PathBuf {
        let path = self.templates.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create template subdirectory");
        }
        fs::write(&path, content).expect("Failed to write template");
        path
    }
}

/// Create a fresh project layout with an optional extra configuration
/// fragment appended to the generated `stencil.toml`.
///
/// # Panics
///
/// Panics if any of the directories or files cannot be created.
pub fn project_dirs(extra_config: &str) -> ProjectDirs {
    let root = TempDir::new().expect("Failed to create temporary directory");
    let templates = root.path().join("templates");
    let compiled = root.path().join("compiled");
    let cache = root.path().join("cache");
    fs::create_dir_all(&templates).expect("Failed to create templates directory");

    let config = format!(
        "template_dirs = [{:?}]\ncompile_dir = {:?}\ncache_dir = {:?}\n{}",
        templates.display().to_string(),
        compiled.display().to_string(),
        cache.display().to_string(),
        extra_config,
    );
    fs::write(root.path().join("stencil.toml"), config).expect("Failed to write stencil.toml");

    ProjectDirs {
        root,
        templates,
        compiled,
        cache,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_dirs_writes_a_loadable_config() {
        let dirs = project_dirs("caching = \"lifetime_current\"\n");
        let text = fs::read_to_string(dirs.config_path()).unwrap();
        assert!(text.contains("template_dirs"));
        assert!(text.contains("lifetime_current"));
    }

    #[test]
    fn write_template_creates_subdirectories() {
        let dirs = project_dirs("");
        let path = dirs.write_template("partials/header.tpl", "hi");
        assert!(path.is_file());
        assert_eq!(fs::read_to_string(path).unwrap(), "hi");
    }
}
