//! Engine configuration
//!
//! `EngineConfig` is the explicit configuration context the compiler, the
//! resource resolver and the render lifecycle all borrow. It replaces the
//! original engine's global facade object.

pub mod consts;
mod model;

pub use model::{CachingMode, EngineConfig};
