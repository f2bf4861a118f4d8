//! Tag compiler dispatch.
//!
//! Each built-in construct registers a [`TagCompiler`]. A tag name that is
//! not a built-in resolves, in order, against user-defined `{function}`
//! definitions, then registered plugins; anything still unresolved at the
//! end of the pass is a fatal unknown-tag error. Closing tags resolve
//! through the same table by base name and must match the top of the
//! open-tag stack.

pub mod assign;
pub mod block;
pub mod capture;
pub mod conditional;
pub mod delim;
pub mod extends;
pub mod for_loop;
pub mod foreach;
pub mod function;
pub mod include;
pub mod nocache;
pub mod section;

use crate::compile::context::{CompileContext, OpenTag};
use crate::error::{Result, StencilError};
use crate::ir::Op;
use crate::lexer::Token;
use crate::parser::{parse_attrs, Expr, TokenCursor};
use std::collections::HashMap;

/// One `{name ...}` invocation handed to a tag compiler, body tokens
/// still unparsed.
pub struct TagCall {
    pub name: String,
    pub line: usize,
    pub body: Vec<Token>,
}

impl TagCall {
    pub fn cursor(&self) -> TokenCursor<'_> {
        TokenCursor::new(&self.body, self.line)
    }
}

pub enum TagOutput {
    /// Ops to append to the current buffer frame.
    Ops(Vec<Op>),
    /// The tag mutated context state (opened a frame, registered a
    /// definition) and emits nothing here.
    None,
    /// Abort this pass and recompile from new effective source.
    Restart { source: String, locator: String },
}

pub trait TagCompiler: Send + Sync {
    fn compile_open(
        &self,
        call: &TagCall,
        ctx: &mut CompileContext,
        registry: &TagRegistry,
    ) -> Result<TagOutput>;

    fn compile_close(
        &self,
        name: &str,
        line: usize,
        ctx: &mut CompileContext,
        registry: &TagRegistry,
    ) -> Result<TagOutput> {
        let _ = (ctx, registry);
        Err(StencilError::TagUnexpectedClose {
            found: name.to_string(),
            line,
        })
    }
}

/// Kinds a registered plugin can take at a tag position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    /// `{name args}` producing output through a render-time callback.
    Function,
    /// `{name args}body{/name}` transforming its rendered body.
    Block,
}

pub struct TagRegistry {
    builtin: HashMap<&'static str, Box<dyn TagCompiler>>,
    plugins: HashMap<String, PluginKind>,
}

impl TagRegistry {
    pub fn with_builtins() -> Self {
        let mut builtin: HashMap<&'static str, Box<dyn TagCompiler>> = HashMap::new();
        builtin.insert("assign", Box::new(assign::AssignTag));
        builtin.insert("append", Box::new(assign::AppendTag));
        builtin.insert("capture", Box::new(capture::CaptureTag));
        builtin.insert("if", Box::new(conditional::IfTag));
        builtin.insert("elseif", Box::new(conditional::ElseIfTag));
        builtin.insert("else", Box::new(conditional::ElseTag));
        builtin.insert("while", Box::new(conditional::WhileTag));
        builtin.insert("for", Box::new(for_loop::ForTag));
        builtin.insert("forelse", Box::new(for_loop::ForElseTag));
        builtin.insert("foreach", Box::new(foreach::ForeachTag));
        builtin.insert("foreachelse", Box::new(foreach::ForeachElseTag));
        builtin.insert("section", Box::new(section::SectionTag));
        builtin.insert("sectionelse", Box::new(section::SectionElseTag));
        builtin.insert("include", Box::new(include::IncludeTag));
        builtin.insert("extends", Box::new(extends::ExtendsTag));
        builtin.insert("block", Box::new(block::BlockTag));
        builtin.insert("function", Box::new(function::FunctionTag));
        builtin.insert("call", Box::new(function::CallTag));
        builtin.insert("nocache", Box::new(nocache::NocacheTag));
        builtin.insert("ldelim", Box::new(delim::LdelimTag));
        builtin.insert("rdelim", Box::new(delim::RdelimTag));
        TagRegistry {
            builtin,
            plugins: HashMap::new(),
        }
    }

    pub fn register_plugin(&mut self, name: impl Into<String>, kind: PluginKind) {
        self.plugins.insert(name.into(), kind);
    }

    pub fn plugin_kind(&self, name: &str) -> Option<PluginKind> {
        self.plugins.get(name).copied()
    }

    pub fn compile_open(&self, call: &TagCall, ctx: &mut CompileContext) -> Result<TagOutput> {
        if let Some(handler) = self.builtin.get(call.name.as_str()) {
            return handler.compile_open(call, ctx, self);
        }
        // user-defined template functions shadow plugins
        if ctx.functions.contains_key(&call.name) {
            return function::compile_function_call(call, ctx);
        }
        match self.plugin_kind(&call.name) {
            Some(PluginKind::Function) => {
                let (args, nocache) = named_args(call)?;
                Ok(TagOutput::Ops(wrap_nocache(
                    vec![Op::CallPlugin {
                        name: call.name.clone(),
                        args,
                        line: call.line,
                    }],
                    ctx.nocache || nocache,
                )))
            }
            Some(PluginKind::Block) => {
                let (args, nocache) = named_args(call)?;
                ctx.open_tags.push(OpenTag::BlockPlugin {
                    name: call.name.clone(),
                    args,
                    saved_nocache: ctx.nocache,
                });
                if nocache {
                    ctx.nocache = true;
                }
                ctx.buffer.push_frame();
                Ok(TagOutput::None)
            }
            None => {
                // may be a function defined later in this pass; verified
                // once the pass completes
                ctx.pending_calls.push((call.name.clone(), call.line));
                function::compile_function_call(call, ctx)
            }
        }
    }

    pub fn compile_close(
        &self,
        name: &str,
        line: usize,
        ctx: &mut CompileContext,
    ) -> Result<TagOutput> {
        if let Some(handler) = self.builtin.get(name) {
            return handler.compile_close(name, line, ctx, self);
        }
        if self.plugin_kind(name) == Some(PluginKind::Block) {
            return self.close_block_plugin(name, line, ctx);
        }
        Err(StencilError::TagUnknown {
            name: name.to_string(),
            line,
        })
    }

    fn close_block_plugin(
        &self,
        closer: &str,
        line: usize,
        ctx: &mut CompileContext,
    ) -> Result<TagOutput> {
        match ctx.open_tags.pop() {
            Some(OpenTag::BlockPlugin {
                name,
                args,
                saved_nocache,
            }) if name == closer => {
                let body = ctx.buffer.pop_frame()?;
                let nocache = ctx.nocache;
                ctx.nocache = saved_nocache;
                Ok(TagOutput::Ops(wrap_nocache(
                    vec![Op::BlockPlugin {
                        name,
                        args,
                        body,
                        line,
                    }],
                    nocache,
                )))
            }
            Some(top) => Err(StencilError::TagMismatched {
                found: closer.to_string(),
                open: top.name().to_string(),
                line,
            }),
            None => Err(StencilError::TagUnexpectedClose {
                found: closer.to_string(),
                line,
            }),
        }
    }

    /// Verify deferred `{funcname}` calls once a pass has completed.
    pub fn check_pending_calls(&self, ctx: &CompileContext) -> Result<()> {
        for (name, line) in &ctx.pending_calls {
            if ctx.functions.contains_key(name) {
                continue;
            }
            if self.plugin_kind(name) == Some(PluginKind::Function) {
                continue;
            }
            return Err(StencilError::TagUnknown {
                name: name.clone(),
                line: *line,
            });
        }
        Ok(())
    }
}

/// Parse a tag body as a plain named-argument list, splitting off a bare
/// `nocache` flag.
pub fn named_args(call: &TagCall) -> Result<(Vec<(String, Expr)>, bool)> {
    let mut cursor = call.cursor();
    let attrs = parse_attrs(&mut cursor)?;
    let mut nocache = false;
    let mut args = Vec::new();
    for attr in attrs {
        if attr.name == "nocache" && attr.bare {
            nocache = true;
        } else {
            args.push((attr.name, attr.value));
        }
    }
    Ok((args, nocache))
}

/// Wrap compiled ops in a nocache unit when the cumulative flag is set.
pub fn wrap_nocache(ops: Vec<Op>, nocache: bool) -> Vec<Op> {
    if nocache && !ops.is_empty() {
        vec![Op::Nocache { body: ops }]
    } else {
        ops
    }
}
