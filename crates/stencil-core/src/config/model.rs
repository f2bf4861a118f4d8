use crate::config::consts;
use crate::error::{Result, StencilError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How rendered output is cached between requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CachingMode {
    /// Never cache rendered output.
    Off,
    /// Cache entries expire against the lifetime configured *now*.
    LifetimeCurrent,
    /// Cache entries expire against the lifetime saved when they were written.
    LifetimeSaved,
}

impl CachingMode {
    pub fn is_enabled(self) -> bool {
        self != CachingMode::Off
    }
}

/// Engine configuration, passed by reference through the whole pipeline.
///
/// There is deliberately no global engine object: a `Template` borrows one of
/// these for the duration of a render request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Opening tag delimiter.
    #[serde(default = "default_left_delimiter")]
    pub left_delimiter: String,
    /// Closing tag delimiter.
    #[serde(default = "default_right_delimiter")]
    pub right_delimiter: String,

    /// Directories searched for `file:` templates, first match wins.
    #[serde(default)]
    pub template_dirs: Vec<PathBuf>,
    /// Additional directories the security policy trusts for absolute paths.
    #[serde(default)]
    pub trusted_dirs: Vec<PathBuf>,
    /// Root directory for compiled artifacts.
    pub compile_dir: PathBuf,
    /// Root directory for cached render output.
    pub cache_dir: PathBuf,

    #[serde(default = "default_caching")]
    pub caching: CachingMode,
    /// Seconds a cache entry stays valid; negative means never expires.
    #[serde(default = "default_cache_lifetime")]
    pub cache_lifetime: i64,

    /// Compare source timestamps against compiled artifacts on every request.
    #[serde(default = "default_true")]
    pub compile_check: bool,
    /// Recompile unconditionally.
    #[serde(default)]
    pub force_compile: bool,
    /// Ignore existing cache entries (still writes fresh ones).
    #[serde(default)]
    pub force_cache: bool,

    /// Treat a delimiter followed by whitespace as literal text.
    #[serde(default = "default_true")]
    pub auto_literal: bool,
    /// Referencing an unassigned variable is an error instead of empty output.
    #[serde(default)]
    pub error_on_unassigned: bool,

    /// Shard compiled/cache files into hash-prefix subdirectories.
    #[serde(default = "default_true")]
    pub use_sub_dirs: bool,
    /// Advisory compile lock (artifact mtime touch/restore).
    #[serde(default = "default_true")]
    pub compile_locking: bool,

    /// Resource kind assumed for bare template references.
    #[serde(default = "default_resource_kind")]
    pub default_resource_kind: String,

    #[serde(default = "default_inheritance_depth")]
    pub max_inheritance_depth: usize,
    #[serde(default = "default_render_depth")]
    pub max_render_depth: usize,
}

impl EngineConfig {
    /// Minimal configuration rooted at the given working directories.
    pub fn new(
        template_dir: impl Into<PathBuf>,
        compile_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        EngineConfig {
            left_delimiter: default_left_delimiter(),
            right_delimiter: default_right_delimiter(),
            template_dirs: vec![template_dir.into()],
            trusted_dirs: Vec::new(),
            compile_dir: compile_dir.into(),
            cache_dir: cache_dir.into(),
            caching: CachingMode::Off,
            cache_lifetime: consts::DEFAULT_CACHE_LIFETIME,
            compile_check: true,
            force_compile: false,
            force_cache: false,
            auto_literal: true,
            error_on_unassigned: false,
            use_sub_dirs: true,
            compile_locking: true,
            default_resource_kind: "file".to_string(),
            max_inheritance_depth: consts::limits::MAX_INHERITANCE_DEPTH,
            max_render_depth: consts::limits::MAX_RENDER_DEPTH,
        }
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| StencilError::ConfigParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.left_delimiter.is_empty() || self.right_delimiter.is_empty() {
            return Err(StencilError::ConfigInvalidValue {
                field: "delimiters".to_string(),
                reason: "delimiters must be non-empty".to_string(),
            });
        }
        if self.left_delimiter == self.right_delimiter {
            return Err(StencilError::ConfigInvalidValue {
                field: "delimiters".to_string(),
                reason: "left and right delimiter must differ".to_string(),
            });
        }
        if self.max_inheritance_depth == 0 || self.max_render_depth == 0 {
            return Err(StencilError::ConfigInvalidValue {
                field: "limits".to_string(),
                reason: "depth limits must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn default_left_delimiter() -> String {
    consts::delimiters::LEFT.to_string()
}

fn default_right_delimiter() -> String {
    consts::delimiters::RIGHT.to_string()
}

fn default_caching() -> CachingMode {
    CachingMode::Off
}

fn default_cache_lifetime() -> i64 {
    consts::DEFAULT_CACHE_LIFETIME
}

fn default_true() -> bool {
    true
}

fn default_resource_kind() -> String {
    "file".to_string()
}

fn default_inheritance_depth() -> usize {
    consts::limits::MAX_INHERITANCE_DEPTH
}

fn default_render_depth() -> usize {
    consts::limits::MAX_RENDER_DEPTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            compile_dir = "/tmp/compiled"
            cache_dir = "/tmp/cache"
            "#,
        )
        .unwrap();
        assert_eq!(config.left_delimiter, "{");
        assert_eq!(config.right_delimiter, "}");
        assert_eq!(config.caching, CachingMode::Off);
        assert!(config.compile_check);
        assert!(config.auto_literal);
    }

    #[test]
    fn test_equal_delimiters_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
            left_delimiter = "%"
            right_delimiter = "%"
            compile_dir = "/tmp/compiled"
            cache_dir = "/tmp/cache"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("CONFIG_INVALID_VALUE"));
    }

    #[test]
    fn test_caching_mode_parse() {
        let config = EngineConfig::from_toml_str(
            r#"
            compile_dir = "/tmp/c"
            cache_dir = "/tmp/k"
            caching = "lifetime_current"
            cache_lifetime = -1
            "#,
        )
        .unwrap();
        assert_eq!(config.caching, CachingMode::LifetimeCurrent);
        assert_eq!(config.cache_lifetime, -1);
    }
}
