//! Named stream templates.
//!
//! A `stream:` locator names a registered input stream. Providers are
//! registered up front and invoked on every load; stream content has no
//! timestamp, so streamed templates are always recompiled and never enter
//! the cache store. The security policy is consulted per stream name.

use crate::config::EngineConfig;
use crate::error::{Result, StencilError};
use crate::resource::{identity_hash, Resource, Source, TemplateReference};
use crate::security::{check_stream, SecurityPolicy};
use std::collections::HashMap;
use std::sync::RwLock;

type StreamProvider = Box<dyn Fn() -> std::io::Result<String> + Send + Sync>;

pub struct StreamResource {
    providers: RwLock<HashMap<String, StreamProvider>>,
}

impl StreamResource {
    pub fn new() -> Self {
        StreamResource {
            providers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        provider: impl Fn() -> std::io::Result<String> + Send + Sync + 'static,
    ) {
        if let Ok(mut providers) = self.providers.write() {
            providers.insert(name.into(), Box::new(provider));
        }
    }

    fn read(&self, name: &str) -> Result<String> {
        let providers = self
            .providers
            .read()
            .map_err(|_| StencilError::Internal("stream provider table poisoned".to_string()))?;
        let provider = providers.get(name).ok_or_else(|| StencilError::ResourceNotFound {
            kind: "stream".to_string(),
            locator: name.to_string(),
        })?;
        provider().map_err(|err| StencilError::ResourceReadError {
            kind: "stream".to_string(),
            locator: name.to_string(),
            reason: err.to_string(),
        })
    }
}

impl Default for StreamResource {
    fn default() -> Self {
        StreamResource::new()
    }
}

impl Resource for StreamResource {
    fn kind(&self) -> &str {
        "stream"
    }

    fn recompiled(&self) -> bool {
        true
    }

    fn cacheable(&self) -> bool {
        false
    }

    fn exists(&self, locator: &str, _: &EngineConfig, _: &dyn SecurityPolicy) -> bool {
        self.providers
            .read()
            .map(|providers| providers.contains_key(locator))
            .unwrap_or(false)
    }

    fn load(
        &self,
        reference: &TemplateReference,
        _config: &EngineConfig,
        policy: &dyn SecurityPolicy,
    ) -> Result<Source> {
        check_stream(policy, &reference.locator)?;
        let content = self.read(&reference.locator)?;
        Ok(Source {
            reference: reference.clone(),
            uid: identity_hash(&reference.key()),
            content,
            timestamp: None,
            filepath: None,
        })
    }

    fn timestamp(
        &self,
        locator: &str,
        _config: &EngineConfig,
        policy: &dyn SecurityPolicy,
    ) -> Result<Option<i64>> {
        check_stream(policy, locator)?;
        Ok(None)
    }
}
