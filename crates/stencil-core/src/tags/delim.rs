//! `{ldelim}` and `{rdelim}`, printing the configured delimiters.

use crate::compile::context::CompileContext;
use crate::error::{Result, StencilError};
use crate::ir::Op;
use crate::tags::{TagCall, TagCompiler, TagOutput, TagRegistry};

fn literal_delim(call: &TagCall, text: String) -> Result<TagOutput> {
    if !call.body.is_empty() {
        return Err(StencilError::ParseSyntax {
            line: call.line,
            message: format!("{} takes no attributes", call.name),
        });
    }
    Ok(TagOutput::Ops(vec![Op::Text(text)]))
}

pub struct LdelimTag;

impl TagCompiler for LdelimTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        literal_delim(call, ctx.config.left_delimiter.clone())
    }
}

pub struct RdelimTag;

impl TagCompiler for RdelimTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        literal_delim(call, ctx.config.right_delimiter.clone())
    }
}
