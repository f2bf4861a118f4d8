//! Cache invalidation by scope, name and age.

use crate::config::consts::cache::{CACHE_SUFFIX, SHARD_LEVELS};
use crate::config::EngineConfig;
use crate::cache::path::sanitize;
use crate::error::Result;
use std::path::Path;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// Filters for [`clear`]. Every supplied filter must match for a file to
/// be deleted; an empty filter set deletes the whole cache.
#[derive(Debug, Default, Clone)]
pub struct ClearFilter {
    /// Template name; matches the trailing basename part of the file name.
    pub name: Option<String>,
    /// Dotted cache scope; prefix-matches the leading path segments.
    pub cache_id: Option<String>,
    /// Compile scope; matches the path segment just before the shard dirs.
    pub compile_id: Option<String>,
    /// Only delete entries older than this many seconds.
    pub max_age: Option<u64>,
}

/// Delete matching cache entries, deepest-first so emptied scope
/// directories can be removed on the way out. Returns the number of files
/// deleted. Compiled artifacts live in a separate store and are never
/// touched.
pub fn clear(config: &EngineConfig, filter: &ClearFilter) -> Result<usize> {
    let root = &config.cache_dir;
    if !root.is_dir() {
        return Ok(0);
    }
    let name_suffix = filter
        .name
        .as_deref()
        .map(|name| format!(".{}.{}", sanitize(trailing_name(name)), CACHE_SUFFIX));
    let cache_segments: Vec<String> = filter
        .cache_id
        .as_deref()
        .map(|id| {
            id.split('.')
                .filter(|s| !s.is_empty())
                .map(sanitize)
                .collect()
        })
        .unwrap_or_default();
    let compile_segment = filter.compile_id.as_deref().map(sanitize);
    let cutoff = filter
        .max_age
        .map(|age| SystemTime::now() - Duration::from_secs(age));

    let mut deleted = 0usize;
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if entry.file_type().is_dir() {
            if entry.path() != root.as_path() {
                // removal only succeeds once the directory has emptied
                let _ = std::fs::remove_dir(entry.path());
            }
            continue;
        }
        if !matches_entry(
            entry.path(),
            root,
            name_suffix.as_deref(),
            &cache_segments,
            compile_segment.as_deref(),
            cutoff,
            config.use_sub_dirs,
        ) {
            continue;
        }
        if std::fs::remove_file(entry.path()).is_ok() {
            deleted += 1;
        }
    }
    tracing::debug!(deleted, "cleared cache entries");
    Ok(deleted)
}

fn matches_entry(
    path: &Path,
    root: &Path,
    name_suffix: Option<&str>,
    cache_segments: &[String],
    compile_segment: Option<&str>,
    cutoff: Option<SystemTime>,
    use_sub_dirs: bool,
) -> bool {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    if !file_name.ends_with(CACHE_SUFFIX) {
        return false;
    }
    if let Some(suffix) = name_suffix {
        if !file_name.ends_with(suffix) {
            return false;
        }
    }
    if let Some(cutoff) = cutoff {
        let old_enough = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map(|modified| modified <= cutoff)
            .unwrap_or(false);
        if !old_enough {
            return false;
        }
    }
    if cache_segments.is_empty() && compile_segment.is_none() {
        return true;
    }
    let relative = match path.parent().and_then(|p| p.strip_prefix(root).ok()) {
        Some(relative) => relative,
        None => return false,
    };
    let mut dirs: Vec<&str> = relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    // shard directories sit between the scope segments and the file
    if use_sub_dirs {
        let keep = dirs.len().saturating_sub(SHARD_LEVELS);
        dirs.truncate(keep);
    }
    if let Some(compile_segment) = compile_segment {
        if dirs.last().copied() != Some(compile_segment) {
            return false;
        }
    }
    if !cache_segments.is_empty() {
        if dirs.len() < cache_segments.len() {
            return false;
        }
        let matches = cache_segments
            .iter()
            .zip(dirs.iter())
            .all(|(want, have)| want == have);
        if !matches {
            return false;
        }
    }
    true
}

/// `A.B.page.tpl`-style names filter on the final template name part, and
/// a plain `page.tpl` is used as-is.
fn trailing_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
}
