//! Security policy consulted before a resource grants access
//!
//! The policy is a capability object: the resolver asks, the policy decides,
//! and a denial surfaces as a fatal `SECURITY_*` error rather than a silent
//! fallback.

use crate::config::EngineConfig;
use crate::error::{Result, StencilError};
use std::path::{Component, Path, PathBuf};

pub trait SecurityPolicy {
    /// May template source be read from this (canonicalized) path?
    fn is_trusted_path(&self, path: &Path) -> bool;

    /// May template source be read from this named process stream?
    fn is_trusted_stream(&self, name: &str) -> bool;
}

/// Checks access and converts a denial into the fatal error.
pub fn check_path(policy: &dyn SecurityPolicy, path: &Path) -> Result<()> {
    if policy.is_trusted_path(path) {
        Ok(())
    } else {
        Err(StencilError::SecurityPathDenied(path.to_path_buf()))
    }
}

pub fn check_stream(policy: &dyn SecurityPolicy, name: &str) -> Result<()> {
    if policy.is_trusted_stream(name) {
        Ok(())
    } else {
        Err(StencilError::SecurityStreamDenied(name.to_string()))
    }
}

/// Default policy: trusts the configured template and trusted directories,
/// and the standard input/output stream names.
pub struct DefaultPolicy {
    roots: Vec<PathBuf>,
}

impl DefaultPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut roots: Vec<PathBuf> = Vec::new();
        for dir in config.template_dirs.iter().chain(&config.trusted_dirs) {
            roots.push(normalize(&absolutize(dir)));
        }
        DefaultPolicy { roots }
    }
}

impl SecurityPolicy for DefaultPolicy {
    fn is_trusted_path(&self, path: &Path) -> bool {
        let candidate = normalize(path);
        self.roots.iter().any(|root| candidate.starts_with(root))
    }

    fn is_trusted_stream(&self, name: &str) -> bool {
        matches!(name, "stdin")
    }
}

/// A policy that allows everything. Used when the caller opts out.
pub struct AllowAll;

impl SecurityPolicy for AllowAll {
    fn is_trusted_path(&self, _path: &Path) -> bool {
        true
    }

    fn is_trusted_stream(&self, _name: &str) -> bool {
        true
    }
}

/// Resolved file paths are absolute, so relative roots are anchored to the
/// working directory before the containment check can match them.
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Component-based normalization. `canonicalize` would resolve symlinks but
/// fails on paths that do not exist yet; containment checks must work for
/// both, so `.` and `..` components are folded out lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
