//! Compiled artifact persistence.
//!
//! An artifact is a versioned JSON document: provenance header, the
//! property block (dependencies, nocache metadata, hoisted function
//! definitions) and the op tree. The format is stable within a major
//! version so artifacts written by one run load in the next.

use crate::cache::store;
use crate::error::{Result, StencilError};
use crate::ir::{FunctionDef, Op};
use crate::resource::DepKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const ARTIFACT_VERSION: u32 = 1;

/// One recorded upstream source, keyed in the property block by its
/// identity hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDependency {
    pub locator: String,
    pub timestamp: Option<i64>,
    pub kind: DepKind,
}

/// Everything the render lifecycle needs to know about a compiled
/// template without re-reading its source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyBlock {
    /// Every source consulted during compilation, inheritance ancestors
    /// and merged includes included.
    pub file_dependency: BTreeMap<String, FileDependency>,
    pub nocache_hash: String,
    pub has_nocache_code: bool,
    pub function_defs: BTreeMap<String, FunctionDef>,
    /// Per-template cache lifetime override.
    pub cache_lifetime: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub version: u32,
    pub generator: String,
    /// Source provenance, the template reference key.
    pub source: String,
    pub compiled_at: DateTime<Utc>,
    pub properties: PropertyBlock,
    pub ops: Vec<Op>,
}

impl CompiledArtifact {
    pub fn new(source: String, properties: PropertyBlock, ops: Vec<Op>) -> Self {
        CompiledArtifact {
            version: ARTIFACT_VERSION,
            generator: format!("stencil {}", env!("CARGO_PKG_VERSION")),
            source,
            compiled_at: Utc::now(),
            properties,
            ops,
        }
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        store::write(path, &json)
    }

    /// Load an artifact if one exists; a version mismatch reads as absent
    /// so the caller recompiles instead of failing.
    pub fn load(path: &Path) -> Result<Option<(CompiledArtifact, i64)>> {
        let (content, timestamp) = match store::read(path)? {
            Some(found) => found,
            None => return Ok(None),
        };
        let artifact: CompiledArtifact =
            serde_json::from_str(&content).map_err(|err| StencilError::ArtifactFormat {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        if artifact.version != ARTIFACT_VERSION {
            tracing::debug!(
                path = %path.display(),
                found = artifact.version,
                expected = ARTIFACT_VERSION,
                "artifact version mismatch, recompiling"
            );
            return Ok(None);
        }
        Ok(Some((artifact, timestamp)))
    }
}
