//! Persisted rendered output.
//!
//! A cache entry stores the page as alternating segments: literal text
//! runs and nocache unit placeholders, plus the op table for every unit.
//! On a cache hit the text segments replay verbatim and the units are
//! re-interpreted against the request's variables.

use crate::artifact::FileDependency;
use crate::cache::store;
use crate::error::{Result, StencilError};
use crate::ir::{FunctionDef, Op};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const CACHE_ENTRY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    Text(String),
    /// Index into the unit op table.
    Unit(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: u32,
    /// Template reference key this page was rendered from.
    pub source: String,
    pub cached_at: DateTime<Utc>,
    /// Lifetime in effect when the entry was written; consulted under the
    /// lifetime-saved caching mode.
    pub cache_lifetime: i64,
    pub segments: Vec<Segment>,
    pub units: Vec<Vec<Op>>,
    /// Function definitions the unit ops may call.
    pub function_defs: BTreeMap<String, FunctionDef>,
    /// Every source consulted while producing this page, includes merged
    /// in, so validity checks catch transitive changes.
    pub dependencies: BTreeMap<String, FileDependency>,
}

impl CacheEntry {
    pub fn new(
        source: String,
        cache_lifetime: i64,
        segments: Vec<Segment>,
        units: Vec<Vec<Op>>,
        function_defs: BTreeMap<String, FunctionDef>,
        dependencies: BTreeMap<String, FileDependency>,
    ) -> Self {
        CacheEntry {
            version: CACHE_ENTRY_VERSION,
            source,
            cached_at: Utc::now(),
            cache_lifetime,
            segments,
            units,
            function_defs,
            dependencies,
        }
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        store::write(path, &json)
    }

    /// Load an entry with its mtime; version mismatches read as absent.
    pub fn load(path: &Path) -> Result<Option<(CacheEntry, i64)>> {
        let (content, timestamp) = match store::read(path)? {
            Some(found) => found,
            None => return Ok(None),
        };
        let entry: CacheEntry =
            serde_json::from_str(&content).map_err(|err| StencilError::ArtifactFormat {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        if entry.version != CACHE_ENTRY_VERSION {
            tracing::debug!(
                path = %path.display(),
                found = entry.version,
                expected = CACHE_ENTRY_VERSION,
                "cache entry version mismatch, re-rendering"
            );
            return Ok(None);
        }
        Ok(Some((entry, timestamp)))
    }
}
