//! Persisted cache entries: path layout, atomic storage, invalidation.

pub mod clear;
pub mod path;
pub mod store;


pub use clear::{clear, ClearFilter};
pub use path::{basename, cache_path, compiled_path, sanitize};
