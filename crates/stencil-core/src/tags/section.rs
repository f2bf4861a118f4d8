//! `{section}` / `{sectionelse}` / `{/section}`.

use crate::compile::context::{CompileContext, OpenTag};
use crate::error::{Result, StencilError};
use crate::ir::Op;
use crate::parser::{parse_attrs, validate_attrs, AttrSpec, Expr, Literal};
use crate::tags::{wrap_nocache, TagCall, TagCompiler, TagOutput, TagRegistry};

pub struct SectionTag;

impl TagCompiler for SectionTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        const SPEC: AttrSpec = AttrSpec {
            required: &["name", "loop"],
            optional: &["start", "step", "max"],
            flags: &["nocache"],
            pass_through: false,
        };
        let mut cursor = call.cursor();
        let attrs = parse_attrs(&mut cursor)?;
        let mut attrs = validate_attrs(&call.name, call.line, attrs, &SPEC)?;
        let name = match attrs.require(&call.name, "name", call.line)? {
            Expr::Literal(Literal::Str(name)) if !name.is_empty() => name,
            _ => {
                return Err(StencilError::TagIllegalValue {
                    tag: call.name.clone(),
                    attr: "name".to_string(),
                    line: call.line,
                    reason: "expected a literal section name".to_string(),
                })
            }
        };
        let from = attrs.require(&call.name, "loop", call.line)?;
        ctx.open_tags.push(OpenTag::Section {
            name,
            from,
            start: attrs.take("start"),
            step: attrs.take("step"),
            max: attrs.take("max"),
            body: None,
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
            OpenTag::Section {
                name,
                from,
                start,
                step,
                max,
                body,
                saved_nocache,
            } => {
                let frame = ctx.buffer.pop_frame()?;
                let (body, else_body) = match body {
                    Some(body) => (body, frame),
                    None => (frame, Vec::new()),
                };
                let nocache = ctx.nocache;
                ctx.nocache = saved_nocache;
                Ok(TagOutput::Ops(wrap_nocache(
                    vec![Op::Section {
                        name,
                        from,
                        start,
                        step,
                        max,
                        body,
                        else_body,
                    }],
                    nocache,
                )))
            }
            _ => unreachable!("pop_matching returned the wrong variant"),
        }
    }
}

pub struct SectionElseTag;

impl TagCompiler for SectionElseTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let frame = ctx.buffer.pop_frame()?;
        match ctx.open_tags.last_mut() {
            Some(OpenTag::Section { body: body @ None, .. }) => {
                *body = Some(frame);
            }
            _ => {
                return Err(StencilError::TagMismatched {
                    found: call.name.clone(),
                    open: ctx
                        .open_tags
                        .last()
                        .map(|t| t.name().to_string())
                        .unwrap_or_else(|| "nothing".to_string()),
                    line: call.line,
                })
            }
        }
        ctx.buffer.push_frame();
        Ok(TagOutput::None)
    }
}
