//! Template resource resolution.
//!
//! A template reference like `file:header.tpl` names a resource kind and a
//! locator. Each kind knows how to check existence, derive a stable
//! identity hash, read source text and report a modification timestamp.
//! File and stream access is gated by the injected security policy.

pub mod file;
pub mod registered;
pub mod stream;
pub mod string;


pub use file::FileResource;
pub use registered::RegisteredResource;
pub use stream::StreamResource;
pub use string::StringResource;

use crate::config::EngineConfig;
use crate::error::{Result, StencilError};
use crate::security::SecurityPolicy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Parsed `<kind>:<locator>` template reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateReference {
    pub kind: String,
    pub locator: String,
}

impl TemplateReference {
    /// A single character before `:` is part of a Windows drive letter, so
    /// `C:/tpl/a.tpl` stays a bare locator of the default kind.
    pub fn parse(spec: &str, default_kind: &str) -> Self {
        match spec.find(':') {
            Some(index) if index > 1 => TemplateReference {
                kind: spec[..index].to_string(),
                locator: spec[index + 1..].to_string(),
            },
            _ => TemplateReference {
                kind: default_kind.to_string(),
                locator: spec.to_string(),
            },
        }
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.locator)
    }
}

impl std::fmt::Display for TemplateReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.locator)
    }
}

/// How a recorded file dependency is revalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepKind {
    /// Compare the stored timestamp against the file's current mtime.
    File,
    /// Re-invoke the registered provider's timestamp callback.
    Registered,
}

/// Loaded source text plus the metadata the compiler records about it.
#[derive(Debug, Clone)]
pub struct Source {
    pub reference: TemplateReference,
    pub content: String,
    /// Seconds since the epoch; absent for content-addressed kinds.
    pub timestamp: Option<i64>,
    /// Stable identity hash, the basis for compiled/cache path naming.
    pub uid: String,
    /// Resolved absolute path for file-backed sources.
    pub filepath: Option<PathBuf>,
}

pub trait Resource: Send + Sync {
    fn kind(&self) -> &str;

    /// Recompiled resources never persist a compiled artifact.
    fn recompiled(&self) -> bool {
        false
    }

    /// Whether rendered output of this kind may enter the cache store.
    fn cacheable(&self) -> bool {
        true
    }

    fn dep_kind(&self) -> DepKind {
        DepKind::File
    }

    fn exists(&self, locator: &str, config: &EngineConfig, policy: &dyn SecurityPolicy) -> bool {
        self.timestamp(locator, config, policy)
            .map(|ts| ts.is_some())
            .unwrap_or(false)
    }

    fn load(
        &self,
        reference: &TemplateReference,
        config: &EngineConfig,
        policy: &dyn SecurityPolicy,
    ) -> Result<Source>;

    /// Current timestamp for staleness checks. `Ok(None)` means the kind
    /// has no meaningful timestamp and is revalidated by identity instead.
    fn timestamp(
        &self,
        locator: &str,
        config: &EngineConfig,
        policy: &dyn SecurityPolicy,
    ) -> Result<Option<i64>>;
}

/// Maps resource kinds to handlers and parses reference strings.
pub struct ResourceResolver {
    handlers: HashMap<String, Arc<dyn Resource>>,
    default_kind: String,
}

impl ResourceResolver {
    pub fn new(config: &EngineConfig) -> Self {
        let mut resolver = ResourceResolver {
            handlers: HashMap::new(),
            default_kind: config.default_resource_kind.clone(),
        };
        resolver.register(Arc::new(FileResource));
        resolver.register(Arc::new(StringResource::string()));
        resolver.register(Arc::new(StringResource::eval()));
        resolver.register(Arc::new(StreamResource::new()));
        resolver
    }

    pub fn register(&mut self, handler: Arc<dyn Resource>) {
        self.handlers.insert(handler.kind().to_string(), handler);
    }

    pub fn parse(&self, spec: &str) -> TemplateReference {
        TemplateReference::parse(spec, &self.default_kind)
    }

    pub fn handler(&self, kind: &str) -> Result<&dyn Resource> {
        self.handlers
            .get(kind)
            .map(|h| h.as_ref())
            .ok_or_else(|| StencilError::ResourceUnknownKind(kind.to_string()))
    }

    pub fn load(
        &self,
        spec: &str,
        config: &EngineConfig,
        policy: &dyn SecurityPolicy,
    ) -> Result<Source> {
        let reference = self.parse(spec);
        self.handler(&reference.kind)?
            .load(&reference, config, policy)
    }

    /// Current timestamp of a recorded dependency, by kind.
    pub fn current_timestamp(
        &self,
        kind: &str,
        locator: &str,
        config: &EngineConfig,
        policy: &dyn SecurityPolicy,
    ) -> Result<Option<i64>> {
        self.handler(kind)?.timestamp(locator, config, policy)
    }
}

/// Hex SHA-256 of arbitrary text, used for template identity.
pub fn identity_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    format!("{:x}", digest)
}

/// Seconds since the epoch for a filesystem timestamp.
pub(crate) fn epoch_seconds(time: std::time::SystemTime) -> i64 {
    match time.duration_since(std::time::UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    }
}
