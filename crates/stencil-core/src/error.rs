use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StencilError {
    // Lex errors
    #[error("LEX_UNEXPECTED_INPUT: no token matched at line {line} near '{excerpt}'")]
    LexUnexpectedInput { line: usize, excerpt: String },

    #[error("LEX_UNTERMINATED_STRING: string opened at line {0} is never closed")]
    LexUnterminatedString(usize),

    #[error("LEX_UNCLOSED_LITERAL: missing or misspelled literal closing tag (opened at line {0})")]
    LexUnclosedLiteral(usize),

    // Parse / tag errors
    #[error("PARSE_SYNTAX: line {line}: {message}")]
    ParseSyntax { line: usize, message: String },

    #[error("PARSE_EXPECTED: line {line}: found '{found}', expected one of: {expected}")]
    ParseExpected {
        line: usize,
        found: String,
        expected: String,
    },

    #[error("TAG_UNKNOWN: unknown tag '{name}' at line {line}")]
    TagUnknown { name: String, line: usize },

    #[error("TAG_MISSING_ATTR: tag '{tag}' at line {line} requires attribute '{attr}'")]
    TagMissingAttr {
        tag: String,
        attr: String,
        line: usize,
    },

    #[error("TAG_UNEXPECTED_ATTR: tag '{tag}' at line {line} does not accept attribute '{attr}'")]
    TagUnexpectedAttr {
        tag: String,
        attr: String,
        line: usize,
    },

    #[error("TAG_ILLEGAL_VALUE: tag '{tag}' at line {line}: illegal value for '{attr}': {reason}")]
    TagIllegalValue {
        tag: String,
        attr: String,
        line: usize,
        reason: String,
    },

    #[error("TAG_MISMATCHED: closing tag '{{/{found}}}' at line {line} does not match open tag '{{{open}}}'")]
    TagMismatched {
        found: String,
        open: String,
        line: usize,
    },

    #[error("TAG_UNEXPECTED_CLOSE: closing tag '{{/{found}}}' at line {line} with no tag open")]
    TagUnexpectedClose { found: String, line: usize },

    #[error("TAG_UNCLOSED: unclosed tag '{{{name}}}' opened at line {line}")]
    TagUnclosed { name: String, line: usize },

    // Inheritance errors
    #[error("INHERIT_UNBALANCED_BLOCK: unbalanced {{block}}/{{/block}} tags in '{0}'")]
    InheritUnbalancedBlock(String),

    #[error("INHERIT_CYCLE: template '{0}' appears more than once in its extends chain")]
    InheritCycle(String),

    #[error("INHERIT_TOO_DEEP: extends chain exceeds {0} ancestors")]
    InheritTooDeep(usize),

    // Resource errors
    #[error("RESOURCE_UNKNOWN_KIND: unknown resource kind '{0}'")]
    ResourceUnknownKind(String),

    #[error("RESOURCE_NOT_FOUND: unable to load template {kind} '{locator}'")]
    ResourceNotFound { kind: String, locator: String },

    #[error("RESOURCE_READ_ERROR: failed to read {kind} '{locator}': {reason}")]
    ResourceReadError {
        kind: String,
        locator: String,
        reason: String,
    },

    // Security errors
    #[error("SECURITY_PATH_DENIED: access to '{0}' denied by security policy")]
    SecurityPathDenied(PathBuf),

    #[error("SECURITY_STREAM_DENIED: access to stream '{0}' denied by security policy")]
    SecurityStreamDenied(String),

    // Cache / artifact errors
    #[error("CACHE_WRITE_ERROR: failed to write '{path}': {reason}")]
    CacheWriteError { path: PathBuf, reason: String },

    #[error("CACHE_READ_ERROR: failed to read '{path}': {reason}")]
    CacheReadError { path: PathBuf, reason: String },

    #[error("ARTIFACT_FORMAT: '{path}': {reason}")]
    ArtifactFormat { path: PathBuf, reason: String },

    // Config errors
    #[error("CONFIG_PARSE_ERROR: {0}")]
    ConfigParseError(String),

    #[error("CONFIG_INVALID_VALUE: {field}: {reason}")]
    ConfigInvalidValue { field: String, reason: String },

    // Render errors
    #[error("RENDER_UNASSIGNED_VAR: variable '${0}' is not assigned")]
    RenderUnassignedVar(String),

    #[error("RENDER_UNDEFINED_FUNCTION: template function '{0}' is not defined")]
    RenderUndefinedFunction(String),

    #[error("RENDER_UNDEFINED_MODIFIER: unknown modifier '{0}'")]
    RenderUndefinedModifier(String),

    #[error("RENDER_TOO_DEEP: render nesting exceeds {0} levels")]
    RenderTooDeep(usize),

    #[error("RENDER_TYPE: {0}")]
    RenderType(String),

    // Internal invariant violations (correctness bugs, not user input)
    #[error("INTERNAL: {0}")]
    Internal(String),

    // IO errors
    #[error("IO_ERROR: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for StencilError {
    fn from(err: serde_json::Error) -> Self {
        StencilError::Internal(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, StencilError>;
