//! `{block}` / `{/block}`.
//!
//! During the final pass of an inheritance chain the block override table
//! decides what a block actually renders: the ancestor's own body compiles
//! inline unless an override exists, in which case the merged source is
//! compiled as a fragment in its place.

use crate::compile::context::{CompileContext, OpenTag};
use crate::compile::run_fragment;
use crate::error::{Result, StencilError};
use crate::lexer::TokenKind;
use crate::parser::{parse_attrs, validate_attrs, AttrSpec, Expr, Literal, TokenCursor};
use crate::tags::{wrap_nocache, TagCall, TagCompiler, TagOutput, TagRegistry};

pub struct BlockTag;

fn parse_name(call: &TagCall) -> Result<(String, bool)> {
    let mut cursor = call.cursor();
    // shorthand `{block top}` / `{block 'top'}`
    let shorthand = match (cursor.peek(), cursor.peek_at(1)) {
        (Some(TokenKind::Ident(name)), next) if next != Some(&TokenKind::Equal) => {
            Some(name.clone())
        }
        (Some(TokenKind::SingleString(name)), _) => Some(name.clone()),
        _ => None,
    };
    if let Some(name) = shorthand {
        cursor.next();
        let nocache = parse_flags(&mut cursor, call)?;
        return Ok((name, nocache));
    }
    const SPEC: AttrSpec = AttrSpec {
        required: &["name"],
        optional: &[],
        flags: &["nocache", "append", "prepend"],
        pass_through: false,
    };
    let attrs = parse_attrs(&mut cursor)?;
    let mut attrs = validate_attrs(&call.name, call.line, attrs, &SPEC)?;
    let name = match attrs.require(&call.name, "name", call.line)? {
        Expr::Literal(Literal::Str(name)) if !name.is_empty() => name,
        _ => {
            return Err(StencilError::TagIllegalValue {
                tag: call.name.clone(),
                attr: "name".to_string(),
                line: call.line,
                reason: "expected a literal block name".to_string(),
            })
        }
    };
    Ok((name, attrs.flag("nocache")))
}

fn parse_flags(cursor: &mut TokenCursor, call: &TagCall) -> Result<bool> {
    const SPEC: AttrSpec = AttrSpec {
        required: &[],
        optional: &[],
        flags: &["nocache", "append", "prepend"],
        pass_through: false,
    };
    let attrs = parse_attrs(cursor)?;
    let attrs = validate_attrs(&call.name, call.line, attrs, &SPEC)?;
    Ok(attrs.flag("nocache"))
}

impl TagCompiler for BlockTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let (name, nocache) = parse_name(call)?;
        ctx.open_tags.push(OpenTag::Block {
            name,
            body_start: ctx.tag_end,
            saved_nocache: ctx.nocache,
        });
        if nocache {
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
        registry: &TagRegistry,
    ) -> Result<TagOutput> {
        match ctx.pop_matching(name, line)? {
            OpenTag::Block {
                name,
                body_start,
                saved_nocache,
            } => {
                let inline = ctx.buffer.pop_frame()?;
                let body_end = ctx.tag_start.max(body_start);
                let ancestor_body = ctx.source_text[body_start..body_end].to_string();
                let effective = ctx.block_table.effective(
                    &name,
                    &ancestor_body,
                    &ctx.config.left_delimiter,
                    &ctx.config.right_delimiter,
                );
                let ops = match effective {
                    // override wins; its merged source compiles here
                    Some(merged) if merged != ancestor_body => {
                        run_fragment(&merged, ctx, registry)?
                    }
                    _ => inline,
                };
                let nocache = ctx.nocache;
                ctx.nocache = saved_nocache;
                Ok(TagOutput::Ops(wrap_nocache(ops, nocache)))
            }
            _ => unreachable!("pop_matching returned the wrong variant"),
        }
    }
}
