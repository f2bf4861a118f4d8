//! Atomic persistence for cache entries and compiled artifacts.
//!
//! Writes go to a temporary file in the destination directory and are
//! renamed over the target, so a concurrent reader sees either the old
//! content or the new content, never a torn write. Concurrent writers are
//! last-writer-wins.

use crate::error::{Result, StencilError};
use crate::resource::epoch_seconds;
use std::path::Path;
use tempfile::NamedTempFile;

/// Read an entry back with its modification timestamp. A missing file is
/// not an error, it simply means a cache miss.
pub fn read(path: &Path) -> Result<Option<(String, i64)>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(StencilError::CacheReadError {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })
        }
    };
    let modified = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(epoch_seconds)
        .map_err(|err| StencilError::CacheReadError {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    Ok(Some((content, modified)))
}

pub fn write(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| StencilError::CacheWriteError {
        path: path.to_path_buf(),
        reason: "path has no parent directory".to_string(),
    })?;
    std::fs::create_dir_all(parent).map_err(|err| StencilError::CacheWriteError {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let write_all = |tmp: &mut NamedTempFile| -> std::io::Result<()> {
        use std::io::Write;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()
    };
    let mut tmp = NamedTempFile::new_in(parent).map_err(|err| StencilError::CacheWriteError {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    write_all(&mut tmp).map_err(|err| StencilError::CacheWriteError {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    tmp.persist(path).map_err(|err| StencilError::CacheWriteError {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    tracing::debug!(path = %path.display(), "persisted artifact");
    Ok(())
}
