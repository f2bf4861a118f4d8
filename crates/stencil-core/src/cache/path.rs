//! Deterministic cache and compiled-artifact path construction.
//!
//! Layout under the cache root:
//!
//! ```text
//! <cache_root>/[cache_id segments/][compile_id/][shard dirs/]
//!     <uid>.<kind>.<basename>.cache.json
//! ```
//!
//! A dotted cache id (`sectionA.box1`) becomes nested directories so that
//! `clear()` can prefix-match scopes positionally. The same composition,
//! minus the cache-id segments, names compiled artifacts under the compile
//! root. `clear()` reverse-engineers these names, so the composition here
//! is load-bearing and must stay stable.

use crate::config::consts::cache::{CACHE_SUFFIX, COMPILED_SUFFIX, SHARD_LEVELS, SHARD_WIDTH};
use crate::config::EngineConfig;
use crate::resource::TemplateReference;
use std::path::{Path, PathBuf};

/// Scope ids and name parts may land in paths, so anything outside a safe
/// set is replaced.
pub fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Template basename used in artifact filenames.
pub fn basename(reference: &TemplateReference) -> String {
    match reference.kind.as_str() {
        "string" | "eval" => "content".to_string(),
        _ => {
            let name = Path::new(&reference.locator)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| reference.locator.clone());
            sanitize(&name)
        }
    }
}

fn push_shards(path: &mut PathBuf, uid: &str, use_sub_dirs: bool) {
    if !use_sub_dirs {
        return;
    }
    for level in 0..SHARD_LEVELS {
        let start = level * SHARD_WIDTH;
        let end = (start + SHARD_WIDTH).min(uid.len());
        if start >= end {
            break;
        }
        path.push(&uid[start..end]);
    }
}

fn file_name(uid: &str, reference: &TemplateReference, suffix: &str) -> String {
    format!(
        "{}.{}.{}.{}",
        uid,
        sanitize(&reference.kind),
        basename(reference),
        suffix
    )
}

/// Path of the persisted cache entry for one template identity.
pub fn cache_path(
    config: &EngineConfig,
    uid: &str,
    reference: &TemplateReference,
    cache_id: Option<&str>,
    compile_id: Option<&str>,
) -> PathBuf {
    let mut path = config.cache_dir.clone();
    if let Some(cache_id) = cache_id {
        for segment in cache_id.split('.').filter(|s| !s.is_empty()) {
            path.push(sanitize(segment));
        }
    }
    if let Some(compile_id) = compile_id {
        path.push(sanitize(compile_id));
    }
    push_shards(&mut path, uid, config.use_sub_dirs);
    path.push(file_name(uid, reference, CACHE_SUFFIX));
    path
}

/// Path of the compiled artifact. Cache ids never apply here: the compiled
/// program is shared by every cache scope.
pub fn compiled_path(
    config: &EngineConfig,
    uid: &str,
    reference: &TemplateReference,
    compile_id: Option<&str>,
) -> PathBuf {
    let mut path = config.compile_dir.clone();
    if let Some(compile_id) = compile_id {
        path.push(sanitize(compile_id));
    }
    push_shards(&mut path, uid, config.use_sub_dirs);
    path.push(file_name(uid, reference, COMPILED_SUFFIX));
    path
}
