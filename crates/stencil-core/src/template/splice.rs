//! Marker splicing.
//!
//! A caching render emits each nocache unit between a marker pair carrying
//! the compile pass's hash and the unit id. This module does both
//! directions of the split: `split_segments` turns marked-up output into
//! the segment list persisted in the cache entry, and `strip_markers`
//! removes the pairs for the text handed back to the caller.

use crate::error::{Result, StencilError};
use crate::ir::markers;
use crate::template::cache_entry::Segment;

/// Split rendered output on the marker pairs of `hash`. The text between
/// a pair was the unit's live value for this request; it is dropped in
/// favor of a unit placeholder so later requests re-evaluate it.
pub fn split_segments(text: &str, hash: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = text;
    let open_tag = format!("{}{}:", markers::OPEN_PREFIX, hash);
    loop {
        let Some(open_at) = rest.find(&open_tag) else {
            if !rest.is_empty() {
                segments.push(Segment::Text(rest.to_string()));
            }
            return Ok(segments);
        };
        if open_at > 0 {
            segments.push(Segment::Text(rest[..open_at].to_string()));
        }
        let after_open = &rest[open_at + open_tag.len()..];
        let (unit, after_header) = parse_unit_header(after_open)?;
        let close = markers::close(hash, unit);
        let close_at = after_header
            .find(&close)
            .ok_or_else(|| unmatched(hash, unit))?;
        segments.push(Segment::Unit(unit));
        rest = &after_header[close_at + close.len()..];
    }
}

/// Remove marker pairs, keeping the unit output between them.
pub fn strip_markers(text: &str, hash: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let open_tag = format!("{}{}:", markers::OPEN_PREFIX, hash);
    let close_tag = format!("{}{}:", markers::CLOSE_PREFIX, hash);
    let mut rest = text;
    loop {
        let open_at = rest.find(&open_tag);
        let close_at = rest.find(&close_tag);
        let (at, tag_len) = match (open_at, close_at) {
            (Some(o), Some(c)) if o < c => (o, open_tag.len()),
            (_, Some(c)) => (c, close_tag.len()),
            (Some(o), None) => (o, open_tag.len()),
            (None, None) => {
                out.push_str(rest);
                return out;
            }
        };
        out.push_str(&rest[..at]);
        let after = &rest[at + tag_len..];
        // skip the `<unit>%%*/` tail
        rest = match after.find(markers::END) {
            Some(end) => &after[end + markers::END.len()..],
            None => "",
        };
    }
}

fn parse_unit_header(text: &str) -> Result<(usize, &str)> {
    let end = text
        .find(markers::END)
        .ok_or_else(|| StencilError::Internal("truncated nocache marker".to_string()))?;
    let unit = text[..end]
        .parse::<usize>()
        .map_err(|_| StencilError::Internal("malformed nocache unit id".to_string()))?;
    Ok((unit, &text[end + markers::END.len()..]))
}

fn unmatched(hash: &str, unit: usize) -> StencilError {
    StencilError::Internal(format!(
        "nocache unit {}:{} has no closing marker",
        hash, unit
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked(hash: &str, unit: usize, inner: &str) -> String {
        format!(
            "{}{}{}",
            markers::open(hash, unit),
            inner,
            markers::close(hash, unit)
        )
    }

    #[test]
    fn split_produces_alternating_segments() {
        let text = format!("head {} tail", marked("cafe", 0, "LIVE"));
        let segments = split_segments(&text, "cafe").expect("split failure");
        assert_eq!(
            segments,
            vec![
                Segment::Text("head ".to_string()),
                Segment::Unit(0),
                Segment::Text(" tail".to_string()),
            ]
        );
    }

    #[test]
    fn split_handles_multiple_units_and_edges() {
        let text = format!("{}{}", marked("cafe", 0, "a"), marked("cafe", 1, "b"));
        let segments = split_segments(&text, "cafe").expect("split failure");
        assert_eq!(segments, vec![Segment::Unit(0), Segment::Unit(1)]);
    }

    #[test]
    fn foreign_hash_markers_are_plain_text() {
        let text = marked("00000000", 0, "x");
        let segments = split_segments(&text, "cafe").expect("split failure");
        assert_eq!(segments, vec![Segment::Text(text)]);
    }

    #[test]
    fn missing_close_is_an_error() {
        let text = format!("{}dangling", markers::open("cafe", 0));
        assert!(split_segments(&text, "cafe").is_err());
    }

    #[test]
    fn strip_keeps_the_unit_output() {
        let text = format!("a {} z", marked("cafe", 3, "value"));
        assert_eq!(strip_markers(&text, "cafe"), "a value z");
    }

    #[test]
    fn strip_without_markers_is_identity() {
        assert_eq!(strip_markers("plain text", "cafe"), "plain text");
    }
}
