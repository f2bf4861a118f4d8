//! Compiler driver.
//!
//! One compile pass lexes the effective source, classifies each tag and
//! hands it to the dispatch registry, accumulating ops in the buffer. An
//! `{extends}` tag aborts the pass and restarts it from the ancestor's
//! source; the restart is bounded by the inheritance depth and cycle
//! guards. At end of input the open-tag stack must be empty.

pub mod buffer;
pub mod context;

#[cfg(test)]
mod tests;

use crate::artifact::PropertyBlock;
use crate::config::EngineConfig;
use crate::error::{Result, StencilError};
use crate::ir::Op;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::parser::{parse_tag, validate_attrs, AttrSpec, ParsedTag};
use crate::resource::{ResourceResolver, Source};
use crate::security::SecurityPolicy;
use crate::tags::{wrap_nocache, TagCall, TagOutput, TagRegistry};
use buffer::OpBuffer;
use context::CompileContext;

pub struct CompileOutput {
    pub ops: Vec<Op>,
    pub properties: PropertyBlock,
}

pub type PrefilterFn = Box<dyn Fn(&str) -> String + Send + Sync>;
pub type PostfilterFn = Box<dyn Fn(Vec<Op>) -> Vec<Op> + Send + Sync>;

/// External collaborators run around every compile: prefilters rewrite the
/// effective source text before lexing (again after an inheritance
/// restart, since the pass starts over from new source), postfilters
/// transform the finished op tree.
#[derive(Default)]
pub struct Filters {
    prefilters: Vec<PrefilterFn>,
    postfilters: Vec<PostfilterFn>,
}

impl Filters {
    pub fn register_prefilter(&mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) {
        self.prefilters.push(Box::new(f));
    }

    pub fn register_postfilter(&mut self, f: impl Fn(Vec<Op>) -> Vec<Op> + Send + Sync + 'static) {
        self.postfilters.push(Box::new(f));
    }

    fn pre(&self, source: String) -> String {
        self.prefilters.iter().fold(source, |text, f| f(&text))
    }

    fn post(&self, ops: Vec<Op>) -> Vec<Op> {
        self.postfilters.iter().fold(ops, |ops, f| f(ops))
    }
}

enum PassResult {
    Done,
    Restart { source: String },
}

/// Compile one template source to its op tree and property block.
pub fn compile_source(
    source: &Source,
    config: &EngineConfig,
    resolver: &ResourceResolver,
    policy: &dyn SecurityPolicy,
    registry: &TagRegistry,
) -> Result<CompileOutput> {
    compile_source_with(source, config, resolver, policy, registry, &Filters::default())
}

/// [`compile_source`] with caller-supplied pre/postfilters.
pub fn compile_source_with(
    source: &Source,
    config: &EngineConfig,
    resolver: &ResourceResolver,
    policy: &dyn SecurityPolicy,
    registry: &TagRegistry,
    filters: &Filters,
) -> Result<CompileOutput> {
    let mut ctx = CompileContext::new(config, resolver, policy);
    ctx.record_dependency(source);
    let mut current = source.content.clone();
    loop {
        ctx.begin_pass(filters.pre(current));
        match run_pass(&mut ctx, registry)? {
            PassResult::Done => break,
            PassResult::Restart { source } => current = source,
        }
    }
    registry.check_pending_calls(&ctx)?;

    let ops = filters.post(std::mem::take(&mut ctx.buffer).finish()?);
    let properties = PropertyBlock {
        file_dependency: ctx.dependencies,
        nocache_hash: generate_nocache_hash(),
        has_nocache_code: Op::has_nocache(&ops),
        function_defs: ctx.functions,
        cache_lifetime: ctx.cache_lifetime,
    };
    tracing::debug!(
        source = %source.reference,
        deps = properties.file_dependency.len(),
        nocache = properties.has_nocache_code,
        "compiled template"
    );
    Ok(CompileOutput { ops, properties })
}

/// Compile a source fragment into ops using the surrounding pass state.
/// Used for merged inheritance block bodies.
pub fn run_fragment(
    fragment: &str,
    ctx: &mut CompileContext,
    registry: &TagRegistry,
) -> Result<Vec<Op>> {
    let saved_source = std::mem::replace(&mut ctx.source_text, fragment.to_string());
    let saved_span = (ctx.tag_start, ctx.tag_end);
    let open_depth = ctx.open_tags.len();

    ctx.buffer.push_frame();
    let result = run_pass(ctx, registry);
    ctx.source_text = saved_source;
    (ctx.tag_start, ctx.tag_end) = saved_span;
    match result {
        Ok(PassResult::Done) => {
            if ctx.open_tags.len() != open_depth {
                return Err(StencilError::Internal(
                    "fragment compile left tags open".to_string(),
                ));
            }
            ctx.buffer.pop_frame()
        }
        Ok(PassResult::Restart { .. }) => Err(StencilError::ParseSyntax {
            line: 1,
            message: "extends is not allowed inside a block body".to_string(),
        }),
        Err(err) => Err(err),
    }
}

fn run_pass(ctx: &mut CompileContext, registry: &TagRegistry) -> Result<PassResult> {
    let source_text = ctx.source_text.clone();
    let config = ctx.config;
    let mut lexer = Lexer::new(&source_text, config);
    let mut last_line = 1;
    loop {
        let tag_start = lexer.offset();
        let token = match lexer.next_token()? {
            Some(token) => token,
            None => break,
        };
        last_line = token.line;
        match token.kind {
            TokenKind::Text(text) | TokenKind::Linebreak(text) | TokenKind::Literal(text) => {
                ctx.buffer.text(&text)
            }
            TokenKind::RawPassthrough(text) => ctx.buffer.text(&text),
            TokenKind::LiteralStart | TokenKind::LiteralEnd => {}
            // stands in for nothing outside an inheritance merge
            TokenKind::BlockChild => {}
            kind @ (TokenKind::Ldel | TokenKind::LdelSlash) => {
                let closing = kind == TokenKind::LdelSlash;
                let line = token.line;
                ctx.tag_start = tag_start;
                let body = collect_tag(&mut lexer, line)?;
                ctx.tag_end = lexer.offset();
                match parse_tag(body, line, closing)? {
                    ParsedTag::Print { expr, attrs, line } => {
                        compile_print(expr, attrs, line, ctx)?;
                    }
                    ParsedTag::Call { name, line, body } => {
                        let call = TagCall { name, line, body };
                        match registry.compile_open(&call, ctx)? {
                            TagOutput::Ops(ops) => ctx.buffer.extend(ops),
                            TagOutput::None => {}
                            TagOutput::Restart { source, .. } => {
                                return Ok(PassResult::Restart { source })
                            }
                        }
                    }
                    ParsedTag::Close { name, line } => {
                        match registry.compile_close(&name, line, ctx)? {
                            TagOutput::Ops(ops) => ctx.buffer.extend(ops),
                            TagOutput::None => {}
                            TagOutput::Restart { .. } => {
                                return Err(StencilError::Internal(
                                    "closing tag raised a restart".to_string(),
                                ))
                            }
                        }
                    }
                }
            }
            other => {
                return Err(StencilError::ParseSyntax {
                    line: last_line,
                    message: format!("unexpected {} outside a tag", other.describe()),
                })
            }
        }
    }
    ctx.assert_closed(last_line)?;
    Ok(PassResult::Done)
}

/// Pull the token run of one tag, through the delimiter that closes it.
/// Embedded tags inside double-quoted strings keep their own delimiter
/// tokens, so nesting is depth-counted.
fn collect_tag(lexer: &mut Lexer, line: usize) -> Result<Vec<Token>> {
    let mut depth = 1usize;
    let mut body = Vec::new();
    loop {
        let token = match lexer.next_token()? {
            Some(token) => token,
            None => {
                return Err(StencilError::ParseSyntax {
                    line,
                    message: "unexpected end of template inside a tag".to_string(),
                })
            }
        };
        match token.kind {
            TokenKind::Ldel | TokenKind::LdelSlash => depth += 1,
            TokenKind::Rdel => {
                depth -= 1;
                if depth == 0 {
                    return Ok(body);
                }
            }
            _ => {}
        }
        body.push(token);
    }
}

/// `{$expr|mods}` and other print-position expressions.
fn compile_print(
    expr: crate::parser::Expr,
    attrs: Vec<crate::parser::Attr>,
    line: usize,
    ctx: &mut CompileContext,
) -> Result<()> {
    let attrs = validate_attrs("print", line, attrs, &AttrSpec::new())?;
    let nocache = ctx.nocache || attrs.flag("nocache");
    let ops = wrap_nocache(vec![Op::Emit { expr, line }], nocache);
    ctx.buffer.extend(ops);
    Ok(())
}

/// Per-pass random identifier carried by every nocache marker this
/// compile emits; distinguishes markers from literal lookalike text.
pub fn generate_nocache_hash() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let pid = std::process::id();
    crate::resource::identity_hash(&format!("{}:{}", nanos, pid))[..16].to_string()
}
