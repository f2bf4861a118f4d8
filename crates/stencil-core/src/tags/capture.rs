//! `{capture}` / `{/capture}`.

use crate::compile::context::{CompileContext, OpenTag};
use crate::error::Result;
use crate::ir::Op;
use crate::parser::{parse_attrs, validate_attrs, AttrSpec, Expr, Literal};
use crate::tags::{wrap_nocache, TagCall, TagCompiler, TagOutput, TagRegistry};

pub struct CaptureTag;

impl TagCompiler for CaptureTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        const SPEC: AttrSpec = AttrSpec {
            required: &[],
            optional: &["name", "assign", "append"],
            flags: &["nocache"],
            pass_through: false,
        };
        let mut cursor = call.cursor();
        let attrs = parse_attrs(&mut cursor)?;
        let mut attrs = validate_attrs(&call.name, call.line, attrs, &SPEC)?;
        let name = attrs
            .take("name")
            .unwrap_or_else(|| Expr::Literal(Literal::Str("default".to_string())));
        let assign = attrs.take("assign").and_then(literal);
        let append = attrs.take("append").and_then(literal);
        ctx.open_tags.push(OpenTag::Capture {
            name,
            assign,
            append,
            saved_nocache: ctx.nocache,
        });
        if attrs.flag("nocache") {
            ctx.nocache = true;
        }
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
            OpenTag::Capture {
                name,
                assign,
                append,
                saved_nocache,
            } => {
                let body = ctx.buffer.pop_frame()?;
                let nocache = ctx.nocache;
                ctx.nocache = saved_nocache;
                Ok(TagOutput::Ops(wrap_nocache(
                    vec![Op::Capture {
                        name,
                        assign,
                        append,
                        body,
                    }],
                    nocache,
                )))
            }
            _ => unreachable!("pop_matching returned the wrong variant"),
        }
    }
}

fn literal(expr: Expr) -> Option<String> {
    match expr {
        Expr::Literal(Literal::Str(name)) if !name.is_empty() => Some(name),
        _ => None,
    }
}
