//! `{nocache}` / `{/nocache}`.

use crate::compile::context::{CompileContext, OpenTag};
use crate::error::{Result, StencilError};
use crate::ir::Op;
use crate::tags::{TagCall, TagCompiler, TagOutput, TagRegistry};

pub struct NocacheTag;

impl TagCompiler for NocacheTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        if !call.body.is_empty() {
            return Err(StencilError::ParseSyntax {
                line: call.line,
                message: "nocache takes no attributes".to_string(),
            });
        }
        ctx.open_tags.push(OpenTag::Nocache {
            saved_nocache: ctx.nocache,
        });
        ctx.nocache = true;
        ctx.buffer.push_frame();
        Ok(TagOutput::None)
    }

    fn compile_close(
        &self,
        name: &str,
        line: usize,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        match ctx.pop_matching(name, line)? {
            OpenTag::Nocache { saved_nocache } => {
                let body = ctx.buffer.pop_frame()?;
                ctx.nocache = saved_nocache;
                if body.is_empty() {
                    return Ok(TagOutput::None);
                }
                Ok(TagOutput::Ops(vec![Op::Nocache { body }]))
            }
            _ => unreachable!("pop_matching returned the wrong variant"),
        }
    }
}
