//! Engine-wide constant defaults

/// Default tag delimiters
pub mod delimiters {
    pub const LEFT: &str = "{";
    pub const RIGHT: &str = "}";
}

/// Limits protecting against runaway templates
pub mod limits {
    /// Maximum number of ancestors in an extends chain
    pub const MAX_INHERITANCE_DEPTH: usize = 32;

    /// Maximum nesting depth of sub-renders (includes, functions)
    pub const MAX_RENDER_DEPTH: usize = 64;
}

/// Cache layout parameters
pub mod cache {
    /// Width in hex characters of one shard directory level
    pub const SHARD_WIDTH: usize = 2;

    /// Number of shard directory levels when sharding is enabled
    pub const SHARD_LEVELS: usize = 2;

    /// File suffix of compiled artifacts
    pub const COMPILED_SUFFIX: &str = "ops.json";

    /// File suffix of cached render output
    pub const CACHE_SUFFIX: &str = "cache.json";
}

/// Default cache lifetime in seconds (an hour, matching the original engine)
pub const DEFAULT_CACHE_LIFETIME: i64 = 3600;
