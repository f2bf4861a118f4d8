//! Op accumulation during compilation.
//!
//! The buffer keeps a stack of frames so constructs that need their body
//! as a unit (an `{if}` branch, a `{function}` body, a capture) compile
//! into their own frame and are popped whole. Adjacent text runs coalesce
//! into one `Op::Text`, with one exception: when the junction of two runs
//! would spell the opening of a nocache output marker, a zero-width
//! separator op is kept between them so the render stream never
//! manufactures a marker by accident.

use crate::error::{Result, StencilError};
use crate::ir::{markers, Op};

#[derive(Debug)]
pub struct OpBuffer {
    frames: Vec<Vec<Op>>,
}

impl OpBuffer {
    pub fn new() -> Self {
        OpBuffer {
            frames: vec![Vec::new()],
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    pub fn pop_frame(&mut self) -> Result<Vec<Op>> {
        if self.frames.len() < 2 {
            return Err(StencilError::Internal(
                "op buffer frame underflow".to_string(),
            ));
        }
        Ok(self.frames.pop().unwrap_or_default())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn current(&mut self) -> &mut Vec<Op> {
        if self.frames.is_empty() {
            self.frames.push(Vec::new());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let frame = self.current();
        if let Some(Op::Text(prev)) = frame.last_mut() {
            if junction_collides(prev, text) {
                frame.push(Op::Sep);
                frame.push(Op::Text(text.to_string()));
            } else {
                prev.push_str(text);
            }
            return;
        }
        frame.push(Op::Text(text.to_string()));
    }

    pub fn op(&mut self, op: Op) {
        self.current().push(op);
    }

    pub fn extend(&mut self, ops: Vec<Op>) {
        self.current().extend(ops);
    }

    /// Final op stream; all nested frames must have been closed.
    pub fn finish(mut self) -> Result<Vec<Op>> {
        if self.frames.len() != 1 {
            return Err(StencilError::Internal(format!(
                "op buffer finished with {} open frames",
                self.frames.len() - 1
            )));
        }
        Ok(self.frames.pop().unwrap_or_default())
    }
}

impl Default for OpBuffer {
    fn default() -> Self {
        OpBuffer::new()
    }
}

/// True when `left + right` would complete a marker-open prefix across
/// the junction that neither side contains on its own.
fn junction_collides(left: &str, right: &str) -> bool {
    let prefix = markers::OPEN_PREFIX;
    for split in 1..prefix.len() {
        if left.ends_with(&prefix[..split]) && right.starts_with(&prefix[split..]) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_text_coalesces() {
        let mut buffer = OpBuffer::new();
        buffer.text("hello ");
        buffer.text("world");
        let ops = buffer.finish().expect("finish failure");
        assert_eq!(ops, vec![Op::Text("hello world".to_string())]);
    }

    #[test]
    fn marker_spelling_junction_keeps_a_separator() {
        let mut buffer = OpBuffer::new();
        buffer.text("/*%%Stencil");
        buffer.text("Nocache:deadbeef:0%%*/");
        let ops = buffer.finish().expect("finish failure");
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[1], Op::Sep);
    }

    #[test]
    fn frames_isolate_bodies() {
        let mut buffer = OpBuffer::new();
        buffer.text("outer");
        buffer.push_frame();
        buffer.text("inner");
        let inner = buffer.pop_frame().expect("pop failure");
        assert_eq!(inner, vec![Op::Text("inner".to_string())]);
        let ops = buffer.finish().expect("finish failure");
        assert_eq!(ops, vec![Op::Text("outer".to_string())]);
    }

    #[test]
    fn unbalanced_frames_are_an_internal_error() {
        let mut buffer = OpBuffer::new();
        buffer.push_frame();
        assert!(buffer.finish().is_err());
    }
}
