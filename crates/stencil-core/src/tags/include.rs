//! `{include}`.
//!
//! Sub-templates render at run time through the engine, so the include
//! compiles to a single op carrying the target expression and the
//! explicit variable assignments. When the target is a literal reference
//! the included source is recorded as a dependency immediately; dynamic
//! targets contribute their dependencies when the include actually runs.

use crate::compile::context::CompileContext;
use crate::error::Result;
use crate::ir::Op;
use crate::parser::{parse_attrs, validate_attrs, AttrSpec, Expr, Literal};
use crate::tags::{wrap_nocache, TagCall, TagCompiler, TagOutput, TagRegistry};

pub struct IncludeTag;

impl TagCompiler for IncludeTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        const SPEC: AttrSpec = AttrSpec {
            required: &["file"],
            optional: &["assign"],
            flags: &["nocache"],
            pass_through: true,
        };
        let mut cursor = call.cursor();
        let attrs = parse_attrs(&mut cursor)?;
        let mut attrs = validate_attrs(&call.name, call.line, attrs, &SPEC)?;
        let target = attrs.require(&call.name, "file", call.line)?;
        let assign = attrs.take("assign").and_then(|expr| match expr {
            Expr::Literal(Literal::Str(name)) if !name.is_empty() => Some(name),
            _ => None,
        });

        if let Expr::Literal(Literal::Str(spec)) = &target {
            if let Ok(source) = ctx.resolver.load(spec, ctx.config, ctx.policy) {
                ctx.record_dependency(&source);
            }
        }

        let nocache = ctx.nocache || attrs.flag("nocache");
        let vars = std::mem::take(&mut attrs.extra);
        Ok(TagOutput::Ops(wrap_nocache(
            vec![Op::Include {
                target,
                vars,
                assign,
                line: call.line,
            }],
            nocache,
        )))
    }
}
