//! `{assign}` and `{append}`.

use crate::compile::context::CompileContext;
use crate::error::{Result, StencilError};
use crate::ir::{AssignScope, Op};
use crate::parser::{parse_attrs, validate_attrs, AttrSpec, Expr, Literal};
use crate::tags::{wrap_nocache, TagCall, TagCompiler, TagOutput, TagRegistry};

fn scope_from(expr: Option<Expr>, tag: &str, line: usize) -> Result<AssignScope> {
    let expr = match expr {
        Some(expr) => expr,
        None => return Ok(AssignScope::Local),
    };
    match expr {
        Expr::Literal(Literal::Str(word)) => match word.as_str() {
            "local" => Ok(AssignScope::Local),
            "parent" => Ok(AssignScope::Parent),
            "root" | "global" => Ok(AssignScope::Root),
            _ => Err(StencilError::TagIllegalValue {
                tag: tag.to_string(),
                attr: "scope".to_string(),
                line,
                reason: format!("unknown scope '{}'", word),
            }),
        },
        _ => Err(StencilError::TagIllegalValue {
            tag: tag.to_string(),
            attr: "scope".to_string(),
            line,
            reason: "scope must be a literal name".to_string(),
        }),
    }
}

/// The `var` attribute must be a literal variable name.
fn var_name(expr: Expr, tag: &str, line: usize) -> Result<String> {
    match expr {
        Expr::Literal(Literal::Str(name)) if !name.is_empty() => Ok(name),
        _ => Err(StencilError::TagIllegalValue {
            tag: tag.to_string(),
            attr: "var".to_string(),
            line,
            reason: "expected a literal variable name".to_string(),
        }),
    }
}

pub struct AssignTag;

impl TagCompiler for AssignTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        const SPEC: AttrSpec = AttrSpec {
            required: &["var", "value"],
            optional: &["scope"],
            flags: &["nocache"],
            pass_through: false,
        };
        let mut cursor = call.cursor();
        let attrs = parse_attrs(&mut cursor)?;
        let mut attrs = validate_attrs(&call.name, call.line, attrs, &SPEC)?;
        let var = var_name(attrs.require(&call.name, "var", call.line)?, &call.name, call.line)?;
        let value = attrs.require(&call.name, "value", call.line)?;
        let scope = scope_from(attrs.take("scope"), &call.name, call.line)?;
        let nocache = ctx.nocache || attrs.flag("nocache");
        Ok(TagOutput::Ops(wrap_nocache(
            vec![Op::Assign { var, value, scope }],
            nocache,
        )))
    }
}

pub struct AppendTag;

impl TagCompiler for AppendTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        const SPEC: AttrSpec = AttrSpec {
            required: &["var", "value"],
            optional: &["index"],
            flags: &["nocache"],
            pass_through: false,
        };
        let mut cursor = call.cursor();
        let attrs = parse_attrs(&mut cursor)?;
        let mut attrs = validate_attrs(&call.name, call.line, attrs, &SPEC)?;
        let var = var_name(attrs.require(&call.name, "var", call.line)?, &call.name, call.line)?;
        let value = attrs.require(&call.name, "value", call.line)?;
        let index = attrs.take("index");
        let nocache = ctx.nocache || attrs.flag("nocache");
        Ok(TagOutput::Ops(wrap_nocache(
            vec![Op::Append { var, value, index }],
            nocache,
        )))
    }
}
