//! Filesystem-backed templates.

use crate::config::EngineConfig;
use crate::error::{Result, StencilError};
use crate::resource::{epoch_seconds, identity_hash, Resource, Source, TemplateReference};
use crate::security::{check_path, SecurityPolicy};
use std::path::{Path, PathBuf};

pub struct FileResource;

impl FileResource {
    /// Resolve a locator to an absolute, security-checked path.
    ///
    /// Absolute and explicitly relative (`./`, `../`) locators bypass the
    /// search path; everything else is tried against `template_dirs` then
    /// `trusted_dirs`, first match wins.
    pub fn resolve(
        locator: &str,
        config: &EngineConfig,
        policy: &dyn SecurityPolicy,
    ) -> Result<PathBuf> {
        let direct = Path::new(locator);
        if direct.is_absolute() || locator.starts_with("./") || locator.starts_with("../") {
            if direct.is_file() {
                let path = canonical(direct)?;
                check_path(policy, &path)?;
                return Ok(path);
            }
            return Err(not_found(locator));
        }
        for dir in config.template_dirs.iter().chain(config.trusted_dirs.iter()) {
            let candidate = dir.join(locator);
            if candidate.is_file() {
                let path = canonical(&candidate)?;
                check_path(policy, &path)?;
                return Ok(path);
            }
        }
        Err(not_found(locator))
    }
}

fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(StencilError::IoError)
}

fn not_found(locator: &str) -> StencilError {
    StencilError::ResourceNotFound {
        kind: "file".to_string(),
        locator: locator.to_string(),
    }
}

impl Resource for FileResource {
    fn kind(&self) -> &str {
        "file"
    }

    fn load(
        &self,
        reference: &TemplateReference,
        config: &EngineConfig,
        policy: &dyn SecurityPolicy,
    ) -> Result<Source> {
        let path = Self::resolve(&reference.locator, config, policy)?;
        let content =
            std::fs::read_to_string(&path).map_err(|err| StencilError::ResourceReadError {
                kind: "file".to_string(),
                locator: reference.locator.clone(),
                reason: err.to_string(),
            })?;
        let timestamp = std::fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .map(epoch_seconds)
            .ok();
        Ok(Source {
            reference: reference.clone(),
            content,
            timestamp,
            uid: identity_hash(&path.to_string_lossy()),
            filepath: Some(path),
        })
    }

    fn timestamp(
        &self,
        locator: &str,
        config: &EngineConfig,
        policy: &dyn SecurityPolicy,
    ) -> Result<Option<i64>> {
        match Self::resolve(locator, config, policy) {
            Ok(path) => {
                let modified = std::fs::metadata(&path).and_then(|meta| meta.modified())?;
                Ok(Some(epoch_seconds(modified)))
            }
            Err(StencilError::ResourceNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
