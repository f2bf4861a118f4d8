// Core modules
pub mod artifact;
pub mod cache;
pub mod compile;
pub mod config;
pub mod error;
pub mod inherit;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod resource;
pub mod runtime;
pub mod security;
pub mod tags;
pub mod template;

// Re-export commonly used types
pub use cache::ClearFilter;
pub use config::{CachingMode, EngineConfig};
pub use error::{Result, StencilError};
pub use resource::{Resource, Source, TemplateReference};
pub use security::{AllowAll, DefaultPolicy, SecurityPolicy};
pub use template::{Engine, Template};
