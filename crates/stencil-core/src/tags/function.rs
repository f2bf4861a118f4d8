//! `{function}` definitions and `{call}` / `{funcname}` invocations.

use crate::compile::context::{CompileContext, OpenTag};
use crate::error::{Result, StencilError};
use crate::ir::{FunctionDef, Op};
use crate::parser::{parse_attrs, Expr, Literal};
use crate::tags::{wrap_nocache, TagCall, TagCompiler, TagOutput, TagRegistry};

pub struct FunctionTag;

impl TagCompiler for FunctionTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let mut cursor = call.cursor();
        let attrs = parse_attrs(&mut cursor)?;
        let mut name = None;
        let mut nocache = false;
        let mut params = Vec::new();
        for attr in attrs {
            match attr.name.as_str() {
                "name" => match attr.value {
                    Expr::Literal(Literal::Str(value)) if !value.is_empty() => {
                        name = Some(value);
                    }
                    _ => {
                        return Err(StencilError::TagIllegalValue {
                            tag: call.name.clone(),
                            attr: "name".to_string(),
                            line: attr.line,
                            reason: "expected a literal function name".to_string(),
                        })
                    }
                },
                "nocache" if attr.bare => nocache = true,
                // every other attribute is a parameter default
                _ => params.push((attr.name, attr.value)),
            }
        }
        let name = name.ok_or_else(|| StencilError::TagMissingAttr {
            tag: call.name.clone(),
            attr: "name".to_string(),
            line: call.line,
        })?;
        ctx.open_tags.push(OpenTag::Function {
            name,
            params,
            nocache,
            saved_nocache: ctx.nocache,
        });
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
            OpenTag::Function {
                name,
                params,
                nocache,
                saved_nocache,
            } => {
                let body = ctx.buffer.pop_frame()?;
                ctx.nocache = saved_nocache;
                ctx.functions.insert(
                    name.clone(),
                    FunctionDef {
                        name,
                        params,
                        body,
                        nocache,
                    },
                );
                // the definition itself renders nothing
                Ok(TagOutput::None)
            }
            _ => unreachable!("pop_matching returned the wrong variant"),
        }
    }
}

/// `{call name=funcname assign=out arg=...}`
pub struct CallTag;

impl TagCompiler for CallTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let mut cursor = call.cursor();
        let attrs = parse_attrs(&mut cursor)?;
        let mut name = None;
        let mut assign = None;
        let mut nocache = false;
        let mut args = Vec::new();
        for attr in attrs {
            match attr.name.as_str() {
                "name" => match attr.value {
                    Expr::Literal(Literal::Str(value)) if !value.is_empty() => {
                        name = Some(value);
                    }
                    _ => {
                        return Err(StencilError::TagIllegalValue {
                            tag: call.name.clone(),
                            attr: "name".to_string(),
                            line: attr.line,
                            reason: "expected a literal function name".to_string(),
                        })
                    }
                },
                "assign" => {
                    if let Expr::Literal(Literal::Str(value)) = attr.value {
                        assign = Some(value);
                    }
                }
                "nocache" if attr.bare => nocache = true,
                _ => args.push((attr.name, attr.value)),
            }
        }
        let name = name.ok_or_else(|| StencilError::TagMissingAttr {
            tag: call.name.clone(),
            attr: "name".to_string(),
            line: call.line,
        })?;
        ctx.pending_calls.push((name.clone(), call.line));
        Ok(TagOutput::Ops(wrap_nocache(
            vec![Op::CallFunction {
                name,
                args,
                assign,
                line: call.line,
            }],
            ctx.nocache || nocache,
        )))
    }
}

/// A bare `{funcname args}` tag resolved as a template function call.
pub fn compile_function_call(call: &TagCall, ctx: &mut CompileContext) -> Result<TagOutput> {
    let mut cursor = call.cursor();
    let attrs = parse_attrs(&mut cursor)?;
    let mut explicit_nocache = false;
    let mut args = Vec::new();
    for attr in attrs {
        if attr.name == "nocache" && attr.bare {
            explicit_nocache = true;
        } else {
            args.push((attr.name, attr.value));
        }
    }
    let nocache = ctx.nocache
        || explicit_nocache
        || ctx
            .functions
            .get(&call.name)
            .map(|def| def.nocache)
            .unwrap_or(false);
    Ok(TagOutput::Ops(wrap_nocache(
        vec![Op::CallFunction {
            name: call.name.clone(),
            args,
            assign: None,
            line: call.line,
        }],
        nocache,
    )))
}
