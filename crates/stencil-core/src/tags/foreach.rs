//! `{foreach}` / `{foreachelse}` / `{/foreach}`.
//!
//! Both spellings are accepted: `{foreach $list as $item}` (with an
//! optional `$key =>` pair) and the attribute form
//! `{foreach from=$list item=item key=key name=loop}`.

use crate::compile::context::{CompileContext, OpenTag};
use crate::error::{Result, StencilError};
use crate::ir::Op;
use crate::lexer::TokenKind;
use crate::parser::{parse_attrs, parse_expr, validate_attrs, AttrSpec, Expr, Literal};
use crate::tags::{wrap_nocache, TagCall, TagCompiler, TagOutput, TagRegistry};

struct ForeachHeader {
    from: Expr,
    item: String,
    key: Option<String>,
    name: Option<String>,
    nocache: bool,
}

fn literal_name(expr: Expr, tag: &str, attr: &str, line: usize) -> Result<String> {
    match expr {
        Expr::Literal(Literal::Str(name)) if !name.is_empty() => Ok(name),
        Expr::Var { name, path } if path.is_empty() => Ok(name),
        _ => Err(StencilError::TagIllegalValue {
            tag: tag.to_string(),
            attr: attr.to_string(),
            line,
            reason: "expected a plain name".to_string(),
        }),
    }
}

fn parse_header(call: &TagCall) -> Result<ForeachHeader> {
    let mut cursor = call.cursor();
    if matches!(cursor.peek(), Some(TokenKind::Dollar)) {
        let from = parse_expr(&mut cursor)?;
        cursor.expect(&TokenKind::As, "'as'")?;
        cursor.expect(&TokenKind::Dollar, "'$'")?;
        let first = match cursor.next().map(|t| &t.kind) {
            Some(TokenKind::Ident(name)) => name.clone(),
            _ => return Err(cursor.unexpected("loop variable name")),
        };
        let (key, item) = if cursor.eat(&TokenKind::Aptr) {
            cursor.expect(&TokenKind::Dollar, "'$'")?;
            let second = match cursor.next().map(|t| &t.kind) {
                Some(TokenKind::Ident(name)) => name.clone(),
                _ => return Err(cursor.unexpected("loop variable name")),
            };
            (Some(first), second)
        } else {
            (None, first)
        };
        const SPEC: AttrSpec = AttrSpec {
            required: &[],
            optional: &["name"],
            flags: &["nocache"],
            pass_through: false,
        };
        let attrs = parse_attrs(&mut cursor)?;
        let mut attrs = validate_attrs(&call.name, call.line, attrs, &SPEC)?;
        let name = attrs
            .take("name")
            .map(|expr| literal_name(expr, &call.name, "name", call.line))
            .transpose()?;
        return Ok(ForeachHeader {
            from,
            item,
            key,
            name,
            nocache: attrs.flag("nocache"),
        });
    }

    const SPEC: AttrSpec = AttrSpec {
        required: &["from", "item"],
        optional: &["key", "name"],
        flags: &["nocache"],
        pass_through: false,
    };
    let attrs = parse_attrs(&mut cursor)?;
    let mut attrs = validate_attrs(&call.name, call.line, attrs, &SPEC)?;
    let from = attrs.require(&call.name, "from", call.line)?;
    let item = literal_name(
        attrs.require(&call.name, "item", call.line)?,
        &call.name,
        "item",
        call.line,
    )?;
    let key = attrs
        .take("key")
        .map(|expr| literal_name(expr, &call.name, "key", call.line))
        .transpose()?;
    let name = attrs
        .take("name")
        .map(|expr| literal_name(expr, &call.name, "name", call.line))
        .transpose()?;
    Ok(ForeachHeader {
        from,
        item,
        key,
        name,
        nocache: attrs.flag("nocache"),
    })
}

pub struct ForeachTag;

impl TagCompiler for ForeachTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let header = parse_header(call)?;
        ctx.open_tags.push(OpenTag::Foreach {
            from: header.from,
            item: header.item,
            key: header.key,
            name: header.name,
            body: None,
            saved_nocache: ctx.nocache,
        });
        if header.nocache {
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
            OpenTag::Foreach {
                from,
                item,
                key,
                name,
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
                    vec![Op::Foreach {
                        from,
                        item,
                        key,
                        name,
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

pub struct ForeachElseTag;

impl TagCompiler for ForeachElseTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let frame = ctx.buffer.pop_frame()?;
        match ctx.open_tags.last_mut() {
            Some(OpenTag::Foreach { body: body @ None, .. }) => {
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
