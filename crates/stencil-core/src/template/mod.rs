//! Render lifecycle.
//!
//! [`Engine`] owns the configuration, the resource resolver, the security
//! policy and the registries; [`Template`] is a short-lived request object
//! borrowed from it. A fetch walks: cache hit? replay segments and
//! re-interpret nocache units. Otherwise compile (or reuse the stored
//! artifact), render, and when caching is on, splice the marked-up output
//! into a cache entry before handing back clean text.

pub mod cache_entry;
pub mod splice;


use crate::artifact::{CompiledArtifact, FileDependency, PropertyBlock};
use crate::cache::{self, ClearFilter};
use crate::compile::{compile_source_with, Filters};
use crate::config::{CachingMode, EngineConfig};
use crate::error::{Result, StencilError};
use crate::ir::Op;
use crate::resource::{epoch_seconds, DepKind, Resource, ResourceResolver, Source, TemplateReference};
use crate::runtime::render::{IncludeUnit, SubTemplates};
use crate::runtime::{ModifierRegistry, PluginRegistry, Renderer, Scopes};
use crate::security::{DefaultPolicy, SecurityPolicy};
use crate::tags::{PluginKind, TagRegistry};
use cache_entry::{CacheEntry, Segment};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, FileTimes};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

pub struct Engine {
    config: EngineConfig,
    resolver: ResourceResolver,
    policy: Box<dyn SecurityPolicy>,
    tags: TagRegistry,
    modifiers: ModifierRegistry,
    plugins: PluginRegistry,
    filters: Filters,
}

/// Compiled material for one template identity, freshly compiled or read
/// back from the artifact store.
struct Compiled {
    source: Source,
    ops: Vec<Op>,
    properties: PropertyBlock,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let policy = Box::new(DefaultPolicy::from_config(&config));
        let resolver = ResourceResolver::new(&config);
        Engine {
            config,
            resolver,
            policy,
            tags: TagRegistry::with_builtins(),
            modifiers: ModifierRegistry::with_builtins(),
            plugins: PluginRegistry::new(),
            filters: Filters::default(),
        }
    }

    pub fn with_policy(mut self, policy: impl SecurityPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn register_resource(&mut self, handler: Arc<dyn Resource>) {
        self.resolver.register(handler);
    }

    /// Rewrite template source text before every compile pass.
    pub fn register_prefilter(&mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) {
        self.filters.register_prefilter(f);
    }

    /// Transform the compiled op tree after every compile.
    pub fn register_postfilter(
        &mut self,
        f: impl Fn(Vec<Op>) -> Vec<Op> + Send + Sync + 'static,
    ) {
        self.filters.register_postfilter(f);
    }

    pub fn register_modifier(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    ) {
        self.modifiers.register(name, f);
    }

    pub fn register_function_plugin(
        &mut self,
        name: impl Into<String> + Clone,
        f: impl Fn(&[(String, Value)]) -> Result<String> + Send + Sync + 'static,
    ) {
        self.tags.register_plugin(name.clone(), PluginKind::Function);
        self.plugins.register_function(name, f);
    }

    pub fn register_block_plugin(
        &mut self,
        name: impl Into<String> + Clone,
        f: impl Fn(&[(String, Value)], &str) -> Result<String> + Send + Sync + 'static,
    ) {
        self.tags.register_plugin(name.clone(), PluginKind::Block);
        self.plugins.register_block(name, f);
    }

    pub fn template(&self, spec: impl Into<String>) -> Template<'_> {
        Template {
            engine: self,
            spec: spec.into(),
            cache_id: None,
            compile_id: None,
            cache_lifetime: None,
            vars: HashMap::new(),
            nocache_vars: Vec::new(),
        }
    }

    /// Remove cache entries matching the filter. Compiled artifacts are a
    /// separate store and are never touched.
    pub fn clear_cache(&self, filter: &ClearFilter) -> Result<usize> {
        cache::clear(&self.config, filter)
    }

    /// Compile a template and persist its artifact, without rendering.
    /// Returns the artifact path.
    pub fn compile_template(
        &self,
        spec: &str,
        compile_id: Option<&str>,
    ) -> Result<PathBuf> {
        let compiled = self.compiled(spec, compile_id)?;
        Ok(cache::compiled_path(
            &self.config,
            &compiled.source.uid,
            &compiled.source.reference,
            compile_id,
        ))
    }

    fn compiled(&self, spec: &str, compile_id: Option<&str>) -> Result<Compiled> {
        let reference = self.resolver.parse(spec);
        let handler = self.resolver.handler(&reference.kind)?;
        let recompiled = handler.recompiled();
        let source = handler.load(&reference, &self.config, self.policy.as_ref())?;
        let path = cache::compiled_path(&self.config, &source.uid, &reference, compile_id);

        if !self.config.force_compile && !recompiled {
            if let Some((artifact, _)) = CompiledArtifact::load(&path)? {
                let fresh = !self.config.compile_check
                    || self.deps_fresh(&artifact.properties.file_dependency)?;
                if fresh {
                    tracing::debug!(source = %reference, "compiled artifact reused");
                    return Ok(Compiled {
                        source,
                        ops: artifact.ops,
                        properties: artifact.properties,
                    });
                }
            }
        }

        let lock = CompileLock::acquire(&path, self.config.compile_locking);
        let output = match compile_source_with(
            &source,
            &self.config,
            &self.resolver,
            self.policy.as_ref(),
            &self.tags,
            &self.filters,
        ) {
            Ok(output) => output,
            Err(err) => {
                lock.restore();
                return Err(err);
            }
        };
        if !recompiled {
            CompiledArtifact::new(
                reference.key(),
                output.properties.clone(),
                output.ops.clone(),
            )
            .store(&path)?;
        }
        Ok(Compiled {
            source,
            ops: output.ops,
            properties: output.properties,
        })
    }

    /// Every recorded dependency still carries the timestamp it was
    /// compiled against.
    fn deps_fresh(&self, dependencies: &BTreeMap<String, FileDependency>) -> Result<bool> {
        for dep in dependencies.values() {
            let saved = match dep.timestamp {
                Some(saved) => saved,
                // identity-addressed sources never go stale
                None => continue,
            };
            let current = match dep.kind {
                DepKind::File => file_mtime(Path::new(&dep.locator))?,
                DepKind::Registered => {
                    let reference = self.resolver.parse(&dep.locator);
                    self.resolver.current_timestamp(
                        &reference.kind,
                        &reference.locator,
                        &self.config,
                        self.policy.as_ref(),
                    )?
                }
            };
            match current {
                Some(ts) if ts <= saved => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}

pub struct Template<'e> {
    engine: &'e Engine,
    spec: String,
    cache_id: Option<String>,
    compile_id: Option<String>,
    /// Per-request lifetime override, in seconds.
    cache_lifetime: Option<i64>,
    vars: HashMap<String, Value>,
    nocache_vars: Vec<String>,
}

impl Template<'_> {
    pub fn cache_id(mut self, id: impl Into<String>) -> Self {
        self.cache_id = Some(id.into());
        self
    }

    pub fn compile_id(mut self, id: impl Into<String>) -> Self {
        self.compile_id = Some(id.into());
        self
    }

    pub fn cache_lifetime(mut self, seconds: i64) -> Self {
        self.cache_lifetime = Some(seconds);
        self
    }

    pub fn assign(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.vars.insert(name.into(), value);
        self
    }

    /// Assign a variable whose reads must re-evaluate on every request
    /// even when the page is served from cache.
    pub fn assign_nocache(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        let name = name.into();
        self.nocache_vars.push(name.clone());
        self.vars.insert(name, value);
        self
    }

    /// Whether a current cache entry exists for this identity.
    pub fn is_cached(&self) -> Result<bool> {
        let reference = self.engine.resolver.parse(&self.spec);
        let handler = self.engine.resolver.handler(&reference.kind)?;
        if !self.caching_active(handler) {
            return Ok(false);
        }
        Ok(self.load_current_entry(&reference)?.is_some())
    }

    pub fn fetch(&self) -> Result<String> {
        let reference = self.engine.resolver.parse(&self.spec);
        let handler = self.engine.resolver.handler(&reference.kind)?;
        let caching = self.caching_active(handler);

        if caching && !self.engine.config.force_cache {
            if let Some(entry) = self.load_current_entry(&reference)? {
                tracing::debug!(source = %reference, "cache hit");
                return self.replay(&entry);
            }
        }

        let compiled = self
            .engine
            .compiled(&self.spec, self.compile_id.as_deref())?;
        let mut scopes = self.scopes();
        let subs = EngineSubs {
            engine: self.engine,
            compile_id: self.compile_id.as_deref(),
        };

        if !caching {
            let mut renderer = Renderer::new(
                &self.engine.config,
                &self.engine.modifiers,
                &self.engine.plugins,
                &subs,
            );
            let rendered =
                renderer.render(&compiled.ops, &compiled.properties.function_defs, &mut scopes)?;
            return Ok(rendered.text);
        }

        let hash = compiled.properties.nocache_hash.clone();
        let mut renderer = Renderer::new(
            &self.engine.config,
            &self.engine.modifiers,
            &self.engine.plugins,
            &subs,
        )
        .with_caching(hash.clone());
        let rendered =
            renderer.render(&compiled.ops, &compiled.properties.function_defs, &mut scopes)?;

        let segments = splice::split_segments(&rendered.text, &hash)?;
        let mut dependencies = compiled.properties.file_dependency.clone();
        dependencies.extend(rendered.dependencies);
        let entry = CacheEntry::new(
            reference.key(),
            self.effective_lifetime(compiled.properties.cache_lifetime),
            segments,
            rendered.units,
            compiled.properties.function_defs.clone(),
            dependencies,
        );
        let path = cache::cache_path(
            &self.engine.config,
            &compiled.source.uid,
            &reference,
            self.cache_id.as_deref(),
            self.compile_id.as_deref(),
        );
        entry.store(&path)?;
        tracing::debug!(source = %reference, path = %path.display(), "cache entry written");
        Ok(splice::strip_markers(&rendered.text, &hash))
    }

    fn caching_active(&self, handler: &dyn Resource) -> bool {
        self.engine.config.caching.is_enabled() && handler.cacheable()
    }

    fn effective_lifetime(&self, template_override: Option<i64>) -> i64 {
        self.cache_lifetime
            .or(template_override)
            .unwrap_or(self.engine.config.cache_lifetime)
    }

    /// Load the cache entry for this identity if it exists and is still
    /// current against its lifetime and every recorded dependency.
    fn load_current_entry(&self, reference: &TemplateReference) -> Result<Option<CacheEntry>> {
        let handler = self.engine.resolver.handler(&reference.kind)?;
        let source = handler.load(reference, &self.engine.config, self.engine.policy.as_ref())?;
        let path = cache::cache_path(
            &self.engine.config,
            &source.uid,
            reference,
            self.cache_id.as_deref(),
            self.compile_id.as_deref(),
        );
        let (entry, written_at) = match CacheEntry::load(&path)? {
            Some(found) => found,
            None => return Ok(None),
        };
        if !self.lifetime_current(&entry, written_at) {
            tracing::debug!(source = %reference, "cache entry expired");
            return Ok(None);
        }
        // the entry carries its own dependency map, includes merged in,
        // so a change anywhere in the page's source set invalidates it
        if self.engine.config.compile_check && !self.engine.deps_fresh(&entry.dependencies)? {
            tracing::debug!(source = %reference, "cache entry invalidated by a dependency");
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn lifetime_current(&self, entry: &CacheEntry, written_at: i64) -> bool {
        let lifetime = match self.engine.config.caching {
            CachingMode::Off => return false,
            CachingMode::LifetimeCurrent => self.effective_lifetime(None),
            CachingMode::LifetimeSaved => entry.cache_lifetime,
        };
        // negative means the entry never expires
        if lifetime < 0 {
            return true;
        }
        let now = epoch_seconds(SystemTime::now());
        now - written_at <= lifetime
    }

    /// Rebuild the page from a cache entry, re-interpreting every nocache
    /// unit against this request's variables.
    fn replay(&self, entry: &CacheEntry) -> Result<String> {
        let mut scopes = self.scopes();
        let subs = EngineSubs {
            engine: self.engine,
            compile_id: self.compile_id.as_deref(),
        };
        let mut renderer = Renderer::new(
            &self.engine.config,
            &self.engine.modifiers,
            &self.engine.plugins,
            &subs,
        );
        let mut out = String::new();
        for segment in &entry.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Unit(id) => {
                    let ops = entry.units.get(*id).ok_or_else(|| {
                        StencilError::Internal(format!("cache entry references unit {}", id))
                    })?;
                    let rendered = renderer.render(ops, &entry.function_defs, &mut scopes)?;
                    out.push_str(&rendered.text);
                }
            }
        }
        Ok(out)
    }

    fn scopes(&self) -> Scopes {
        let mut scopes = Scopes::with_root(self.vars.clone());
        for name in &self.nocache_vars {
            scopes.taint(name);
        }
        scopes
    }
}

/// `{include}` source backed by the engine's compile pipeline, so included
/// templates reuse their own artifacts.
struct EngineSubs<'e> {
    engine: &'e Engine,
    compile_id: Option<&'e str>,
}

impl SubTemplates for EngineSubs<'_> {
    fn load(&self, target: &str) -> Result<IncludeUnit> {
        let compiled = self.engine.compiled(target, self.compile_id)?;
        Ok(IncludeUnit {
            ops: compiled.ops,
            functions: compiled.properties.function_defs,
            dependencies: compiled.properties.file_dependency,
        })
    }
}

/// Advisory compile lock: touching the artifact's mtime makes concurrent
/// processes see it as fresh while this one compiles; the saved times come
/// back if compilation fails.
struct CompileLock {
    saved: Option<(PathBuf, SystemTime)>,
}

impl CompileLock {
    fn acquire(path: &Path, enabled: bool) -> Self {
        if !enabled {
            return CompileLock { saved: None };
        }
        let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return CompileLock { saved: None },
        };
        let touched = File::options()
            .append(true)
            .open(path)
            .and_then(|f| f.set_times(FileTimes::new().set_modified(SystemTime::now())));
        match touched {
            Ok(()) => CompileLock {
                saved: Some((path.to_path_buf(), modified)),
            },
            Err(_) => CompileLock { saved: None },
        }
    }

    /// Put the original mtime back after a failed compile.
    fn restore(self) {
        if let Some((path, modified)) = self.saved {
            let _ = File::options()
                .append(true)
                .open(&path)
                .and_then(|f| f.set_times(FileTimes::new().set_modified(modified)));
        }
    }
}

fn file_mtime(path: &Path) -> Result<Option<i64>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(epoch_seconds(meta.modified()?))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
