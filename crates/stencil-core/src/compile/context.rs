//! Shared state of one compile pass.

use crate::artifact::FileDependency;
use crate::compile::buffer::OpBuffer;
use crate::config::EngineConfig;
use crate::error::{Result, StencilError};
use crate::inherit::BlockOverrideTable;
use crate::ir::FunctionDef;
use crate::parser::Expr;
use crate::resource::{DepKind, ResourceResolver, Source};
use crate::security::SecurityPolicy;
use std::collections::BTreeMap;

/// Auxiliary state an opening tag hands to its closer through the
/// open-tag stack. Every variant saves the nocache flag in effect when
/// the construct opened, restored at close.
#[derive(Debug)]
pub enum OpenTag {
    If {
        branches: Vec<(Expr, Vec<crate::ir::Op>)>,
        pending_cond: Option<Expr>,
        in_else: bool,
        saved_nocache: bool,
    },
    While {
        cond: Expr,
        saved_nocache: bool,
    },
    For {
        var: String,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
        /// Main body, parked once `{forelse}` switches frames.
        body: Option<Vec<crate::ir::Op>>,
        saved_nocache: bool,
    },
    Foreach {
        from: Expr,
        item: String,
        key: Option<String>,
        name: Option<String>,
        body: Option<Vec<crate::ir::Op>>,
        saved_nocache: bool,
    },
    Section {
        name: String,
        from: Expr,
        start: Option<Expr>,
        step: Option<Expr>,
        max: Option<Expr>,
        body: Option<Vec<crate::ir::Op>>,
        saved_nocache: bool,
    },
    Capture {
        name: Expr,
        assign: Option<String>,
        append: Option<String>,
        saved_nocache: bool,
    },
    Function {
        name: String,
        params: Vec<(String, Expr)>,
        nocache: bool,
        saved_nocache: bool,
    },
    Block {
        name: String,
        /// Byte offset of the body start in the pass source.
        body_start: usize,
        saved_nocache: bool,
    },
    BlockPlugin {
        name: String,
        args: Vec<(String, Expr)>,
        saved_nocache: bool,
    },
    Nocache {
        saved_nocache: bool,
    },
}

impl OpenTag {
    pub fn name(&self) -> &'static str {
        match self {
            OpenTag::If { .. } => "if",
            OpenTag::While { .. } => "while",
            OpenTag::For { .. } => "for",
            OpenTag::Foreach { .. } => "foreach",
            OpenTag::Section { .. } => "section",
            OpenTag::Capture { .. } => "capture",
            OpenTag::Function { .. } => "function",
            OpenTag::Block { .. } => "block",
            OpenTag::BlockPlugin { .. } => "blockplugin",
            OpenTag::Nocache { .. } => "nocache",
        }
    }
}

pub struct CompileContext<'e> {
    pub config: &'e EngineConfig,
    pub resolver: &'e ResourceResolver,
    pub policy: &'e dyn SecurityPolicy,
    pub buffer: OpBuffer,
    pub open_tags: Vec<OpenTag>,
    /// Keyed by identity hash; survives inheritance restarts.
    pub dependencies: BTreeMap<String, FileDependency>,
    pub functions: BTreeMap<String, FunctionDef>,
    pub block_table: BlockOverrideTable,
    /// Locators already visited while walking `extends`, for cycle and
    /// depth guards.
    pub chain: Vec<String>,
    pub nocache: bool,
    /// `{funcname}` calls compiled before their definition was seen,
    /// checked once the pass completes.
    pub pending_calls: Vec<(String, usize)>,
    /// Full source of the current pass, for raw body extraction.
    pub source_text: String,
    /// Byte span of the tag currently being compiled.
    pub tag_start: usize,
    pub tag_end: usize,
    pub cache_lifetime: Option<i64>,
}

impl<'e> CompileContext<'e> {
    pub fn new(
        config: &'e EngineConfig,
        resolver: &'e ResourceResolver,
        policy: &'e dyn SecurityPolicy,
    ) -> Self {
        CompileContext {
            config,
            resolver,
            policy,
            buffer: OpBuffer::new(),
            open_tags: Vec::new(),
            dependencies: BTreeMap::new(),
            functions: BTreeMap::new(),
            block_table: BlockOverrideTable::new(),
            chain: Vec::new(),
            nocache: false,
            pending_calls: Vec::new(),
            source_text: String::new(),
            tag_start: 0,
            tag_end: 0,
            cache_lifetime: None,
        }
    }

    /// Reset the per-pass state while keeping everything accumulated
    /// across inheritance restarts.
    pub fn begin_pass(&mut self, source_text: String) {
        self.buffer = OpBuffer::new();
        self.open_tags = Vec::new();
        self.nocache = false;
        self.tag_start = 0;
        self.tag_end = 0;
        self.source_text = source_text;
    }

    /// Record a consulted source in the dependency set.
    pub fn record_dependency(&mut self, source: &Source) {
        let kind = self
            .resolver
            .handler(&source.reference.kind)
            .map(|h| h.dep_kind())
            .unwrap_or(DepKind::File);
        // registered deps keep their kind prefix, so staleness checks can
        // re-invoke the provider; file deps store the resolved path
        let locator = match (kind, &source.filepath) {
            (DepKind::File, Some(path)) => path.to_string_lossy().into_owned(),
            (DepKind::File, None) => source.reference.locator.clone(),
            (DepKind::Registered, _) => source.reference.key(),
        };
        self.dependencies.insert(
            source.uid.clone(),
            FileDependency {
                locator,
                timestamp: source.timestamp,
                kind,
            },
        );
    }

    pub fn pop_matching(&mut self, closer: &str, line: usize) -> Result<OpenTag> {
        match self.open_tags.pop() {
            Some(top) if top.name() == closer => Ok(top),
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

    /// Fatal when any construct is still open at end of input.
    pub fn assert_closed(&self, last_line: usize) -> Result<()> {
        match self.open_tags.last() {
            None => Ok(()),
            Some(top) => Err(StencilError::TagUnclosed {
                name: top.name().to_string(),
                line: last_line,
            }),
        }
    }
}
