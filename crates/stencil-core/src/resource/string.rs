//! Inline template sources.
//!
//! `string:` carries the template text in the locator itself and is
//! recompiled on every use, since nothing ties the text to a file that
//! could be revalidated. `eval:` behaves the same but additionally keeps
//! its rendered output out of the cache store.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::resource::{identity_hash, Resource, Source, TemplateReference};
use crate::security::SecurityPolicy;

pub struct StringResource {
    kind: &'static str,
    cacheable: bool,
}

impl StringResource {
    pub fn string() -> Self {
        StringResource {
            kind: "string",
            cacheable: true,
        }
    }

    pub fn eval() -> Self {
        StringResource {
            kind: "eval",
            cacheable: false,
        }
    }
}

impl Resource for StringResource {
    fn kind(&self) -> &str {
        self.kind
    }

    fn recompiled(&self) -> bool {
        true
    }

    fn cacheable(&self) -> bool {
        self.cacheable
    }

    fn exists(&self, _: &str, _: &EngineConfig, _: &dyn SecurityPolicy) -> bool {
        true
    }

    fn load(
        &self,
        reference: &TemplateReference,
        _config: &EngineConfig,
        _policy: &dyn SecurityPolicy,
    ) -> Result<Source> {
        Ok(Source {
            reference: reference.clone(),
            content: reference.locator.clone(),
            timestamp: None,
            uid: identity_hash(&reference.locator),
            filepath: None,
        })
    }

    fn timestamp(
        &self,
        _locator: &str,
        _config: &EngineConfig,
        _policy: &dyn SecurityPolicy,
    ) -> Result<Option<i64>> {
        Ok(None)
    }
}
