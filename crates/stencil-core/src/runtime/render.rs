//! Op-tree interpretation.
//!
//! The renderer walks the compiled op tree against a scope stack and
//! appends to an output string. Under caching it also brackets every
//! nocache unit with sentinel markers and records the unit's ops so the
//! cache layer can splice fresh values into a cached page later.
//! Included templates and `{function}` calls run inline with the same
//! renderer, so their nocache units share the top template's marker hash.

use crate::artifact::FileDependency;
use crate::config::EngineConfig;
use crate::error::{Result, StencilError};
use crate::ir::{markers, FunctionDef, Op};
use crate::runtime::eval::EvalEnv;
use crate::runtime::modifiers::ModifierRegistry;
use crate::runtime::scope::{LoopProps, Scopes};
use crate::runtime::value::{as_integer, count, stringify, truthy};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Compiled material a sub-template contributes to a render.
pub struct IncludeUnit {
    pub ops: Vec<Op>,
    pub functions: BTreeMap<String, FunctionDef>,
    /// The sub-template's own recorded dependencies, merged into the
    /// enclosing render so cached pages go stale transitively.
    pub dependencies: BTreeMap<String, FileDependency>,
}

/// Source of compiled sub-templates for `{include}`.
pub trait SubTemplates {
    fn load(&self, target: &str) -> Result<IncludeUnit>;
}

/// Default source that rejects every include.
pub struct NoSubTemplates;

impl SubTemplates for NoSubTemplates {
    fn load(&self, target: &str) -> Result<IncludeUnit> {
        Err(StencilError::ResourceNotFound {
            kind: "include".to_string(),
            locator: target.to_string(),
        })
    }
}

pub type FunctionPluginFn = Box<dyn Fn(&[(String, Value)]) -> Result<String> + Send + Sync>;
pub type BlockPluginFn = Box<dyn Fn(&[(String, Value)], &str) -> Result<String> + Send + Sync>;

/// Render-time callbacks for plugins registered with the tag compiler.
#[derive(Default)]
pub struct PluginRegistry {
    functions: HashMap<String, FunctionPluginFn>,
    blocks: HashMap<String, BlockPluginFn>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistry::default()
    }

    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&[(String, Value)]) -> Result<String> + Send + Sync + 'static,
    ) {
        self.functions.insert(name.into(), Box::new(f));
    }

    pub fn register_block(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&[(String, Value)], &str) -> Result<String> + Send + Sync + 'static,
    ) {
        self.blocks.insert(name.into(), Box::new(f));
    }
}

/// Rendered page text plus the nocache unit table and the dependencies
/// of every sub-template pulled in along the way.
#[derive(Debug)]
pub struct RenderOutput {
    pub text: String,
    pub units: Vec<Vec<Op>>,
    pub dependencies: BTreeMap<String, FileDependency>,
}

pub struct Renderer<'r> {
    config: &'r EngineConfig,
    modifiers: &'r ModifierRegistry,
    plugins: &'r PluginRegistry,
    subs: &'r dyn SubTemplates,
    /// Marker emission is on only when the page render feeds the cache.
    caching: bool,
    nocache_hash: String,
    units: Vec<Vec<Op>>,
    functions: BTreeMap<String, FunctionDef>,
    dependencies: BTreeMap<String, FileDependency>,
    depth: usize,
    in_nocache: bool,
    /// Non-zero inside captured bodies, where markers must not leak.
    muted: usize,
}

impl<'r> Renderer<'r> {
    pub fn new(
        config: &'r EngineConfig,
        modifiers: &'r ModifierRegistry,
        plugins: &'r PluginRegistry,
        subs: &'r dyn SubTemplates,
    ) -> Self {
        Renderer {
            config,
            modifiers,
            plugins,
            subs,
            caching: false,
            nocache_hash: String::new(),
            units: Vec::new(),
            functions: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            depth: 0,
            in_nocache: false,
            muted: 0,
        }
    }

    /// Emit nocache markers with the given hash and record unit ops.
    pub fn with_caching(mut self, nocache_hash: impl Into<String>) -> Self {
        self.caching = true;
        self.nocache_hash = nocache_hash.into();
        self
    }

    pub fn render(
        &mut self,
        ops: &[Op],
        functions: &BTreeMap<String, FunctionDef>,
        scopes: &mut Scopes,
    ) -> Result<RenderOutput> {
        for (name, def) in functions {
            self.functions.insert(name.clone(), def.clone());
        }
        let mut out = String::new();
        self.exec(ops, scopes, &mut out)?;
        Ok(RenderOutput {
            text: out,
            units: std::mem::take(&mut self.units),
            dependencies: std::mem::take(&mut self.dependencies),
        })
    }

    fn markers_active(&self) -> bool {
        self.caching && self.muted == 0 && !self.in_nocache
    }

    fn eval(&self, expr: &crate::parser::Expr, scopes: &Scopes) -> Result<Value> {
        EvalEnv {
            config: self.config,
            scopes,
            modifiers: self.modifiers,
        }
        .eval(expr)
    }

    fn exec(&mut self, ops: &[Op], scopes: &mut Scopes, out: &mut String) -> Result<()> {
        for op in ops {
            self.exec_op(op, scopes, out)?;
        }
        Ok(())
    }

    fn exec_op(&mut self, op: &Op, scopes: &mut Scopes, out: &mut String) -> Result<()> {
        match op {
            Op::Text(text) => out.push_str(text),
            Op::Sep => {}
            Op::Emit { expr, .. } => {
                if self.markers_active() && reads_tainted(expr, scopes) {
                    return self.run_as_unit(std::slice::from_ref(op), scopes, out);
                }
                let value = self.eval(expr, scopes)?;
                out.push_str(&stringify(&value));
            }
            Op::Assign { var, value, scope } => {
                let evaled = self.eval(value, scopes)?;
                scopes.assign(var, evaled, *scope);
                if self.in_nocache || reads_tainted(value, scopes) {
                    scopes.taint(var);
                }
            }
            Op::Append { var, value, index } => {
                let evaled = self.eval(value, scopes)?;
                let key = match index {
                    Some(expr) => Some(stringify(&self.eval(expr, scopes)?)),
                    None => None,
                };
                scopes.append(var, evaled, key);
                if self.in_nocache || reads_tainted(value, scopes) {
                    scopes.taint(var);
                }
            }
            Op::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if truthy(&self.eval(cond, scopes)?) {
                        return self.exec(body, scopes, out);
                    }
                }
                self.exec(otherwise, scopes, out)?;
            }
            Op::While { cond, body } => {
                while truthy(&self.eval(cond, scopes)?) {
                    self.exec(body, scopes, out)?;
                }
            }
            Op::ForRange {
                var,
                start,
                end,
                step,
                body,
                else_body,
            } => self.exec_for_range(var, start, end, step.as_ref(), body, else_body, scopes, out)?,
            Op::Foreach {
                from,
                item,
                key,
                name,
                body,
                else_body,
            } => self.exec_foreach(
                from,
                item,
                key.as_deref(),
                name.as_deref(),
                body,
                else_body,
                scopes,
                out,
            )?,
            Op::Section {
                name,
                from,
                start,
                step,
                max,
                body,
                else_body,
            } => self.exec_section(
                name,
                from,
                start.as_ref(),
                step.as_ref(),
                max.as_ref(),
                body,
                else_body,
                scopes,
                out,
            )?,
            Op::Capture {
                name,
                assign,
                append,
                body,
            } => {
                let name = stringify(&self.eval(name, scopes)?);
                let text = self.exec_muted(body, scopes)?;
                if let Some(var) = assign {
                    scopes.set(var, Value::String(text.clone()));
                }
                if let Some(var) = append {
                    scopes.append(var, Value::String(text.clone()), None);
                }
                scopes.set_capture(name, text);
            }
            Op::Include {
                target,
                vars,
                assign,
                ..
            } => self.exec_include(target, vars, assign.as_deref(), scopes, out)?,
            Op::CallFunction {
                name,
                args,
                assign,
                ..
            } => {
                let def = self
                    .functions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| StencilError::RenderUndefinedFunction(name.clone()))?;
                if def.nocache && self.markers_active() {
                    return self.run_as_unit(std::slice::from_ref(op), scopes, out);
                }
                self.exec_function(&def, args, assign.as_deref(), scopes, out)?;
            }
            Op::CallPlugin { name, args, .. } => {
                let f = self
                    .plugins
                    .functions
                    .get(name)
                    .ok_or_else(|| StencilError::RenderUndefinedFunction(name.clone()))?;
                let evaled = self.eval_args(args, scopes)?;
                out.push_str(&f(&evaled)?);
            }
            Op::BlockPlugin {
                name, args, body, ..
            } => {
                let inner = self.exec_muted(body, scopes)?;
                let f = self
                    .plugins
                    .blocks
                    .get(name)
                    .ok_or_else(|| StencilError::RenderUndefinedFunction(name.clone()))?;
                let evaled = self.eval_args(args, scopes)?;
                out.push_str(&f(&evaled, &inner)?);
            }
            Op::Nocache { body } => {
                if self.markers_active() {
                    self.run_as_unit(body, scopes, out)?;
                } else {
                    let saved = self.in_nocache;
                    self.in_nocache = true;
                    let result = self.exec(body, scopes, out);
                    self.in_nocache = saved;
                    result?;
                }
            }
        }
        Ok(())
    }

    /// Record `ops` as a fresh nocache unit and render them between its
    /// marker pair.
    fn run_as_unit(&mut self, ops: &[Op], scopes: &mut Scopes, out: &mut String) -> Result<()> {
        let unit = self.units.len();
        self.units.push(ops.to_vec());
        out.push_str(&markers::open(&self.nocache_hash, unit));
        self.in_nocache = true;
        let result = self.exec(ops, scopes, out);
        self.in_nocache = false;
        result?;
        out.push_str(&markers::close(&self.nocache_hash, unit));
        Ok(())
    }

    /// Render a body into its own string with markers suppressed; used
    /// for captures and block plugin bodies, whose text is transformed
    /// or stored rather than streamed.
    fn exec_muted(&mut self, ops: &[Op], scopes: &mut Scopes) -> Result<String> {
        let mut text = String::new();
        self.muted += 1;
        let result = self.exec(ops, scopes, &mut text);
        self.muted -= 1;
        result?;
        Ok(text)
    }

    fn eval_args(
        &self,
        args: &[(String, crate::parser::Expr)],
        scopes: &Scopes,
    ) -> Result<Vec<(String, Value)>> {
        let mut evaled = Vec::with_capacity(args.len());
        for (name, expr) in args {
            evaled.push((name.clone(), self.eval(expr, scopes)?));
        }
        Ok(evaled)
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_for_range(
        &mut self,
        var: &str,
        start: &crate::parser::Expr,
        end: &crate::parser::Expr,
        step: Option<&crate::parser::Expr>,
        body: &[Op],
        else_body: &[Op],
        scopes: &mut Scopes,
        out: &mut String,
    ) -> Result<()> {
        let start = self.int_value(start, scopes)?;
        let end = self.int_value(end, scopes)?;
        let step = match step {
            Some(expr) => self.int_value(expr, scopes)?,
            None => 1,
        };
        if step == 0 {
            return Err(StencilError::RenderType("for loop step is zero".to_string()));
        }
        let total = if step > 0 {
            ((end - start) / step + 1).max(0)
        } else {
            ((start - end) / -step + 1).max(0)
        };
        if total == 0 {
            return self.exec(else_body, scopes, out);
        }
        let mut i = start;
        for iteration in 1..=total {
            scopes.set(var, Value::from(i));
            scopes.set_loop(
                var,
                LoopProps {
                    index: iteration - 1,
                    iteration,
                    first: iteration == 1,
                    last: iteration == total,
                    total,
                    show: true,
                },
            );
            self.exec(body, scopes, out)?;
            i += step;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_foreach(
        &mut self,
        from: &crate::parser::Expr,
        item: &str,
        key: Option<&str>,
        name: Option<&str>,
        body: &[Op],
        else_body: &[Op],
        scopes: &mut Scopes,
        out: &mut String,
    ) -> Result<()> {
        let source = self.eval(from, scopes)?;
        let entries: Vec<(Value, Value)> = match source {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i as i64), v))
                .collect(),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (Value::String(k), v))
                .collect(),
            _ => Vec::new(),
        };
        let total = entries.len() as i64;
        if total == 0 {
            if let Some(name) = name {
                scopes.set_loop(
                    name,
                    LoopProps {
                        show: false,
                        ..LoopProps::default()
                    },
                );
            }
            return self.exec(else_body, scopes, out);
        }
        for (index, (k, v)) in entries.into_iter().enumerate() {
            let iteration = index as i64 + 1;
            let props = LoopProps {
                index: index as i64,
                iteration,
                first: index == 0,
                last: iteration == total,
                total,
                show: true,
            };
            scopes.set(item, v);
            if let Some(key_var) = key {
                scopes.set(key_var, k);
            }
            scopes.set_loop(item, props.clone());
            if let Some(name) = name {
                scopes.set_loop(name, props);
            }
            self.exec(body, scopes, out)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_section(
        &mut self,
        name: &str,
        from: &crate::parser::Expr,
        start: Option<&crate::parser::Expr>,
        step: Option<&crate::parser::Expr>,
        max: Option<&crate::parser::Expr>,
        body: &[Op],
        else_body: &[Op],
        scopes: &mut Scopes,
        out: &mut String,
    ) -> Result<()> {
        let source = self.eval(from, scopes)?;
        // `loop=` accepts an array (its length) or a plain count
        let limit = match &source {
            Value::Number(_) => as_integer(&source).unwrap_or(0),
            other => count(other) as i64,
        };
        let start = match start {
            Some(expr) => self.int_value(expr, scopes)?,
            None => 0,
        };
        let step = match step {
            Some(expr) => self.int_value(expr, scopes)?,
            None => 1,
        };
        if step == 0 {
            return Err(StencilError::RenderType(
                "section step is zero".to_string(),
            ));
        }
        let max = match max {
            Some(expr) => self.int_value(expr, scopes)?,
            None => i64::MAX,
        };
        let mut indices = Vec::new();
        let mut index = start.clamp(0, (limit - 1).max(0));
        while index >= 0 && index < limit && (indices.len() as i64) < max {
            indices.push(index);
            index += step;
        }
        let total = indices.len() as i64;
        if total == 0 {
            scopes.set_section(
                name,
                LoopProps {
                    show: false,
                    ..LoopProps::default()
                },
            );
            return self.exec(else_body, scopes, out);
        }
        for (n, index) in indices.into_iter().enumerate() {
            let iteration = n as i64 + 1;
            scopes.set_section(
                name,
                LoopProps {
                    index,
                    iteration,
                    first: iteration == 1,
                    last: iteration == total,
                    total,
                    show: true,
                },
            );
            self.exec(body, scopes, out)?;
        }
        Ok(())
    }

    fn exec_include(
        &mut self,
        target: &crate::parser::Expr,
        vars: &[(String, crate::parser::Expr)],
        assign: Option<&str>,
        scopes: &mut Scopes,
        out: &mut String,
    ) -> Result<()> {
        if self.depth + 1 > self.config.max_render_depth {
            return Err(StencilError::RenderTooDeep(self.config.max_render_depth));
        }
        let target = stringify(&self.eval(target, scopes)?);
        let unit = self.subs.load(&target)?;
        let evaled = self.eval_args(vars, scopes)?;
        for (name, def) in unit.functions {
            self.functions.insert(name, def);
        }
        for (key, dep) in unit.dependencies {
            self.dependencies.insert(key, dep);
        }
        self.depth += 1;
        scopes.push_frame();
        for (name, value) in evaled {
            scopes.set(name, value);
        }
        let result = if assign.is_some() {
            self.exec_muted(&unit.ops, scopes).map(Some)
        } else {
            self.exec(&unit.ops, scopes, out).map(|_| None)
        };
        scopes.pop_frame();
        self.depth -= 1;
        if let (Some(var), Some(text)) = (assign, result?) {
            scopes.set(var, Value::String(text));
        }
        Ok(())
    }

    fn exec_function(
        &mut self,
        def: &FunctionDef,
        args: &[(String, crate::parser::Expr)],
        assign: Option<&str>,
        scopes: &mut Scopes,
        out: &mut String,
    ) -> Result<()> {
        if self.depth + 1 > self.config.max_render_depth {
            return Err(StencilError::RenderTooDeep(self.config.max_render_depth));
        }
        let evaled = self.eval_args(args, scopes)?;
        self.depth += 1;
        scopes.push_frame();
        let result = self.run_function_body(def, evaled, assign.is_some(), scopes, out);
        scopes.pop_frame();
        self.depth -= 1;
        if let (Some(var), Some(text)) = (assign, result?) {
            scopes.set(var, Value::String(text));
        }
        Ok(())
    }

    fn run_function_body(
        &mut self,
        def: &FunctionDef,
        args: Vec<(String, Value)>,
        capture: bool,
        scopes: &mut Scopes,
        out: &mut String,
    ) -> Result<Option<String>> {
        for (param, default) in &def.params {
            let value = self.eval(default, scopes)?;
            scopes.set(param, value);
        }
        for (name, value) in args {
            scopes.set(name, value);
        }
        if capture {
            self.exec_muted(&def.body, scopes).map(Some)
        } else {
            self.exec(&def.body, scopes, out).map(|_| None)
        }
    }

    fn int_value(&self, expr: &crate::parser::Expr, scopes: &Scopes) -> Result<i64> {
        let value = self.eval(expr, scopes)?;
        as_integer(&value).ok_or_else(|| {
            StencilError::RenderType("expected a numeric loop bound".to_string())
        })
    }
}

/// Whether the expression reads any nocache-tainted variable.
fn reads_tainted(expr: &crate::parser::Expr, scopes: &Scopes) -> bool {
    let mut vars = Vec::new();
    expr.collect_vars(&mut vars);
    vars.iter().any(|name| scopes.is_tainted(name))
}
