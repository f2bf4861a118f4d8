//! Caller-registered resource kinds.
//!
//! A registered kind delegates source retrieval and timestamping to
//! user-supplied callbacks. Its dependencies are revalidated by invoking
//! the timestamp callback again rather than by a filesystem stat.

use crate::config::EngineConfig;
use crate::error::{Result, StencilError};
use crate::resource::{identity_hash, DepKind, Resource, Source, TemplateReference};
use crate::security::SecurityPolicy;

/// Returns the source text and its timestamp, or `None` when the locator
/// does not exist for this kind.
pub type FetchFn = dyn Fn(&str) -> Option<(String, Option<i64>)> + Send + Sync;

pub struct RegisteredResource {
    kind: String,
    fetch: Box<FetchFn>,
}

impl RegisteredResource {
    pub fn new(
        kind: impl Into<String>,
        fetch: impl Fn(&str) -> Option<(String, Option<i64>)> + Send + Sync + 'static,
    ) -> Self {
        RegisteredResource {
            kind: kind.into(),
            fetch: Box::new(fetch),
        }
    }
}

impl Resource for RegisteredResource {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn dep_kind(&self) -> DepKind {
        DepKind::Registered
    }

    fn exists(&self, locator: &str, _: &EngineConfig, _: &dyn SecurityPolicy) -> bool {
        (self.fetch)(locator).is_some()
    }

    fn load(
        &self,
        reference: &TemplateReference,
        _config: &EngineConfig,
        _policy: &dyn SecurityPolicy,
    ) -> Result<Source> {
        let (content, timestamp) =
            (self.fetch)(&reference.locator).ok_or_else(|| StencilError::ResourceNotFound {
                kind: self.kind.clone(),
                locator: reference.locator.clone(),
            })?;
        Ok(Source {
            reference: reference.clone(),
            uid: identity_hash(&reference.key()),
            content,
            timestamp,
            filepath: None,
        })
    }

    fn timestamp(
        &self,
        locator: &str,
        _config: &EngineConfig,
        _policy: &dyn SecurityPolicy,
    ) -> Result<Option<i64>> {
        Ok((self.fetch)(locator).and_then(|(_, timestamp)| timestamp))
    }
}
