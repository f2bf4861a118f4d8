//! Template inheritance.
//!
//! An `{extends}` chain is walked from the most-derived template backward.
//! Every `{block}` region of every chain member is scanned out of the raw
//! source with explicit nesting-depth counting and folded into the block
//! override table: the first registration (most-derived) wins, later
//! ancestors merge into it by append/prepend mode, or by substituting the
//! accumulated derived content at the parent-insertion marker when the
//! ancestor's own body carries one. The final ancestor compiles as the
//! effective source, with the table consulted at each `{block}` tag.

#[cfg(test)]
mod tests;

use crate::error::{Result, StencilError};
use std::collections::HashMap;

pub const PARENT_MARKER: &str = "$smarty.block.parent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    #[default]
    Replace,
    /// Child content, then the ancestor's own body.
    Append,
    /// Ancestor's own body, then child content.
    Prepend,
}

#[derive(Debug, Clone)]
pub struct BlockOverride {
    pub source: String,
    pub mode: MergeMode,
    pub origin: String,
    /// Set once an ancestor body has been folded in; after that the entry
    /// behaves as a plain replacement.
    pub merged: bool,
}

/// A `{block}` region lifted out of raw source.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedBlock {
    pub name: String,
    pub mode: MergeMode,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct BlockOverrideTable {
    blocks: HashMap<String, BlockOverride>,
}

impl BlockOverrideTable {
    pub fn new() -> Self {
        BlockOverrideTable::default()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Fold one chain member's scanned blocks into the table. Call once
    /// per member, most-derived first.
    pub fn register_all(&mut self, origin: &str, scanned: Vec<ScannedBlock>, ldel: &str, rdel: &str) {
        for block in scanned {
            self.register(origin, block, ldel, rdel);
        }
    }

    fn register(&mut self, origin: &str, block: ScannedBlock, ldel: &str, rdel: &str) {
        let parent_marker = format!("{}{}{}", ldel, PARENT_MARKER, rdel);
        match self.blocks.get_mut(&block.name) {
            None => {
                self.blocks.insert(
                    block.name.clone(),
                    BlockOverride {
                        source: block.body,
                        mode: block.mode,
                        origin: origin.to_string(),
                        merged: false,
                    },
                );
            }
            Some(entry) => {
                // ancestor occurrence: fold its body into the derived entry
                if !entry.merged {
                    match entry.mode {
                        MergeMode::Append => {
                            entry.source = format!("{}{}", entry.source, block.body);
                            entry.merged = true;
                            return;
                        }
                        MergeMode::Prepend => {
                            entry.source = format!("{}{}", block.body, entry.source);
                            entry.merged = true;
                            return;
                        }
                        MergeMode::Replace => {}
                    }
                }
                if block.body.contains(&parent_marker) {
                    // the ancestor is scaffolding: derived content lands at
                    // its insertion marker
                    entry.source = block.body.replace(&parent_marker, &entry.source);
                    entry.merged = true;
                }
            }
        }
    }

    /// Effective source for a `{block}` met during the final compile pass.
    /// A parent-insertion marker in the final ancestor's own body is
    /// replaced by the override content; otherwise the override wins.
    pub fn effective(&self, name: &str, ancestor_body: &str, ldel: &str, rdel: &str) -> Option<String> {
        let entry = self.blocks.get(name)?;
        if !entry.merged {
            match entry.mode {
                MergeMode::Append => {
                    return Some(format!("{}{}", entry.source, ancestor_body));
                }
                MergeMode::Prepend => {
                    return Some(format!("{}{}", ancestor_body, entry.source));
                }
                MergeMode::Replace => {}
            }
        }
        let parent_marker = format!("{}{}{}", ldel, PARENT_MARKER, rdel);
        if ancestor_body.contains(&parent_marker) {
            return Some(ancestor_body.replace(&parent_marker, &entry.source));
        }
        Some(entry.source.clone())
    }
}

/// Scan raw source for `{block name=...}...{/block}` regions.
///
/// Counting nested block opens is required: a first-open/last-close match
/// would pair the wrong tags when blocks nest. Unbalanced tags are fatal.
pub fn scan_blocks(source: &str, origin: &str, ldel: &str, rdel: &str) -> Result<Vec<ScannedBlock>> {
    let open_prefix = format!("{}block", ldel);
    let close_tag = format!("{}/block{}", ldel, rdel);
    let mut scanned = Vec::new();
    let mut pos = 0;

    while let Some(found) = find_block_open(&source[pos..], &open_prefix) {
        let open_start = pos + found;
        let header_start = open_start + open_prefix.len();
        let header_end = match source[header_start..].find(rdel) {
            Some(end) => header_start + end,
            None => return Err(StencilError::InheritUnbalancedBlock(origin.to_string())),
        };
        let header = &source[header_start..header_end];
        let body_start = header_end + rdel.len();

        // nesting-aware close search
        let mut depth = 1usize;
        let mut cursor = body_start;
        let body_end = loop {
            let rest = &source[cursor..];
            let next_open = find_block_open(rest, &open_prefix);
            let next_close = rest.find(&close_tag);
            match (next_open, next_close) {
                (Some(open), Some(close)) if open < close => {
                    depth += 1;
                    cursor += open + open_prefix.len();
                }
                (_, Some(close)) => {
                    depth -= 1;
                    if depth == 0 {
                        break cursor + close;
                    }
                    cursor += close + close_tag.len();
                }
                _ => return Err(StencilError::InheritUnbalancedBlock(origin.to_string())),
            }
        };

        let (name, mode) = parse_block_header(header, origin)?;
        scanned.push(ScannedBlock {
            name,
            mode,
            body: source[body_start..body_end].to_string(),
        });
        pos = body_end + close_tag.len();
    }

    // stray closer after the last region
    if source[pos..].contains(&close_tag) {
        return Err(StencilError::InheritUnbalancedBlock(origin.to_string()));
    }
    Ok(scanned)
}

/// `{block` must be followed by whitespace to count as an open tag, so
/// `{blockquote}`-style text does not trip the scanner.
fn find_block_open(haystack: &str, open_prefix: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(found) = haystack[offset..].find(open_prefix) {
        let at = offset + found;
        let after = haystack[at + open_prefix.len()..].chars().next();
        if matches!(after, Some(c) if c.is_whitespace()) {
            return Some(at);
        }
        offset = at + open_prefix.len();
    }
    None
}

fn parse_block_header(header: &str, origin: &str) -> Result<(String, MergeMode)> {
    let mut name = None;
    let mut mode = MergeMode::Replace;
    for word in header.split_whitespace() {
        if let Some(value) = word.strip_prefix("name=") {
            name = Some(value.trim_matches(|c| c == '\'' || c == '"').to_string());
        } else if word == "append" {
            mode = MergeMode::Append;
        } else if word == "prepend" {
            mode = MergeMode::Prepend;
        } else if name.is_none() && !word.contains('=') {
            // shorthand `{block top}`
            name = Some(word.trim_matches(|c| c == '\'' || c == '"').to_string());
        }
    }
    match name {
        Some(name) if !name.is_empty() => Ok((name, mode)),
        _ => Err(StencilError::InheritUnbalancedBlock(origin.to_string())),
    }
}
