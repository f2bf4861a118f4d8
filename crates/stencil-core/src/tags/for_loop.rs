//! `{for $i=1 to 10 step 2}` / `{forelse}` / `{/for}`.

use crate::compile::context::{CompileContext, OpenTag};
use crate::error::{Result, StencilError};
use crate::ir::Op;
use crate::lexer::TokenKind;
use crate::parser::{parse_attrs, parse_expr, validate_attrs, AttrSpec};
use crate::tags::{wrap_nocache, TagCall, TagCompiler, TagOutput, TagRegistry};

pub struct ForTag;

impl TagCompiler for ForTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let mut cursor = call.cursor();
        cursor.expect(&TokenKind::Dollar, "'$'")?;
        let var = match cursor.next().map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => return Err(cursor.unexpected("loop variable name")),
        };
        cursor.expect(&TokenKind::Equal, "'='")?;
        let start = parse_expr(&mut cursor)?;
        cursor.expect(&TokenKind::To, "'to'")?;
        let end = parse_expr(&mut cursor)?;
        let step = if cursor.eat(&TokenKind::Step) {
            Some(parse_expr(&mut cursor)?)
        } else {
            None
        };
        let attrs = parse_attrs(&mut cursor)?;
        let attrs = validate_attrs(&call.name, call.line, attrs, &AttrSpec::new())?;

        ctx.open_tags.push(OpenTag::For {
            var,
            start,
            end,
            step,
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
            OpenTag::For {
                var,
                start,
                end,
                step,
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
                    vec![Op::ForRange {
                        var,
                        start,
                        end,
                        step,
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

pub struct ForElseTag;

impl TagCompiler for ForElseTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let frame = ctx.buffer.pop_frame()?;
        match ctx.open_tags.last_mut() {
            Some(OpenTag::For { body: body @ None, .. }) => {
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
