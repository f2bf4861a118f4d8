//! `{extends}`.
//!
//! The extends compiler scans the current pass's source for `{block}`
//! regions, folds them into the block override table, loads the named
//! ancestor and signals the driver to restart the whole pass from the
//! ancestor's source. Cycle and depth guards bound the restarts.

use crate::compile::context::CompileContext;
use crate::error::{Result, StencilError};
use crate::inherit::scan_blocks;
use crate::parser::{parse_attrs, validate_attrs, AttrSpec, Expr, Literal};
use crate::tags::{TagCall, TagCompiler, TagOutput, TagRegistry};

pub struct ExtendsTag;

impl TagCompiler for ExtendsTag {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        _registry: &TagRegistry,
    ) -> Result<TagOutput> {
        const SPEC: AttrSpec = AttrSpec {
            required: &["file"],
            optional: &[],
            flags: &[],
            pass_through: false,
        };
        let mut cursor = call.cursor();
        let attrs = parse_attrs(&mut cursor)?;
        let mut attrs = validate_attrs(&call.name, call.line, attrs, &SPEC)?;
        let parent = match attrs.require(&call.name, "file", call.line)? {
            Expr::Literal(Literal::Str(spec)) if !spec.is_empty() => spec,
            _ => {
                return Err(StencilError::TagIllegalValue {
                    tag: call.name.clone(),
                    attr: "file".to_string(),
                    line: call.line,
                    reason: "expected a literal template reference".to_string(),
                })
            }
        };

        if ctx.chain.iter().any(|seen| seen == &parent) {
            return Err(StencilError::InheritCycle(parent));
        }
        if ctx.chain.len() >= ctx.config.max_inheritance_depth {
            return Err(StencilError::InheritTooDeep(
                ctx.config.max_inheritance_depth,
            ));
        }

        // fold this pass's blocks in before the ancestor's are seen
        let origin = ctx
            .chain
            .last()
            .cloned()
            .unwrap_or_else(|| "(root template)".to_string());
        let scanned = scan_blocks(
            &ctx.source_text,
            &origin,
            &ctx.config.left_delimiter,
            &ctx.config.right_delimiter,
        )?;
        ctx.block_table.register_all(
            &origin,
            scanned,
            &ctx.config.left_delimiter,
            &ctx.config.right_delimiter,
        );

        let source = ctx.resolver.load(&parent, ctx.config, ctx.policy)?;
        ctx.record_dependency(&source);
        ctx.chain.push(parent.clone());
        tracing::debug!(parent = %parent, depth = ctx.chain.len(), "extends restart");
        Ok(TagOutput::Restart {
            source: source.content,
            locator: parent,
        })
    }
}
