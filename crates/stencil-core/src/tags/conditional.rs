//! `{if}` / `{elseif}` / `{else}` / `{/if}` and `{while}` / `{/while}`.

use crate::compile::context::{CompileContext, OpenTag};
use crate::error::{Result, StencilError};
use crate::ir::Op;
use crate::parser::{parse_attrs, parse_expr, validate_attrs, AttrSpec};
use crate::tags::{wrap_nocache, TagCall, TagCompiler, TagOutput, TagRegistry};

/// Condition expression, optionally followed by a `nocache` flag.
fn parse_condition(call: &TagCall) -> Result<(crate::parser::Expr, bool)> {
    let mut cursor = call.cursor();
    let cond = parse_expr(&mut cursor)?;
    let attrs = parse_attrs(&mut cursor)?;
    let attrs = validate_attrs(&call.name, call.line, attrs, &AttrSpec::new())?;
    Ok((cond, attrs.flag("nocache")))
}

pub struct IfTag;

impl TagCompiler for IfTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let (cond, nocache) = parse_condition(call)?;
        ctx.open_tags.push(OpenTag::If {
            branches: Vec::new(),
            pending_cond: Some(cond),
            in_else: false,
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
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let frame = match ctx.pop_matching(name, line)? {
            OpenTag::If {
                mut branches,
                pending_cond,
                in_else,
                saved_nocache,
            } => {
                let body = ctx.buffer.pop_frame()?;
                let otherwise = if in_else {
                    body
                } else if let Some(cond) = pending_cond {
                    branches.push((cond, body));
                    Vec::new()
                } else {
                    return Err(StencilError::Internal(
                        "if construct lost its condition".to_string(),
                    ));
                };
                let nocache = ctx.nocache;
                ctx.nocache = saved_nocache;
                wrap_nocache(
                    vec![Op::If {
                        branches,
                        otherwise,
                    }],
                    nocache,
                )
            }
            _ => unreachable!("pop_matching returned the wrong variant"),
        };
        Ok(TagOutput::Ops(frame))
    }
}

pub struct ElseIfTag;

impl TagCompiler for ElseIfTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let (cond, nocache) = parse_condition(call)?;
        let body = ctx.buffer.pop_frame()?;
        match ctx.open_tags.last_mut() {
            Some(OpenTag::If {
                branches,
                pending_cond,
                in_else: false,
                ..
            }) => {
                match pending_cond.take() {
                    Some(prev) => branches.push((prev, body)),
                    None => {
                        return Err(StencilError::Internal(
                            "if construct lost its condition".to_string(),
                        ))
                    }
                }
                *pending_cond = Some(cond);
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
        if nocache {
            ctx.nocache = true;
        }
        ctx.buffer.push_frame();
        Ok(TagOutput::None)
    }
}

pub struct ElseTag;

impl TagCompiler for ElseTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        if !call.body.is_empty() {
            return Err(StencilError::ParseSyntax {
                line: call.line,
                message: "else takes no attributes".to_string(),
            });
        }
        let body = ctx.buffer.pop_frame()?;
        match ctx.open_tags.last_mut() {
            Some(OpenTag::If {
                branches,
                pending_cond,
                in_else,
                ..
            }) if !*in_else => {
                match pending_cond.take() {
                    Some(prev) => branches.push((prev, body)),
                    None => {
                        return Err(StencilError::Internal(
                            "if construct lost its condition".to_string(),
                        ))
                    }
                }
                *in_else = true;
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

pub struct WhileTag;

impl TagCompiler for WhileTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let (cond, nocache) = parse_condition(call)?;
        ctx.open_tags.push(OpenTag::While {
            cond,
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
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        match ctx.pop_matching(name, line)? {
            OpenTag::While {
                cond,
                saved_nocache,
            } => {
                let body = ctx.buffer.pop_frame()?;
                let nocache = ctx.nocache;
                ctx.nocache = saved_nocache;
                Ok(TagOutput::Ops(wrap_nocache(
                    vec![Op::While { cond, body }],
                    nocache,
                )))
            }
            _ => unreachable!("pop_matching returned the wrong variant"),
        }
    }
}
