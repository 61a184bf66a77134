use std::path::PathBuf;

/// Core error type for the bridge.
///
/// Adapter crates map their specific errors into this type so the
/// transformation layer can degrade consistently (fallback text vs failure).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

/// Errors raised inside the markup parser / span renderer.
///
/// These never cross the public conversion entry points; they are logged and
/// turned into a "conversion unavailable" result, so `Error` has no variant
/// for them.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("span {offset}+{length} exceeds text length {text_len} (utf-16 units)")]
    SpanOutOfBounds {
        offset: usize,
        length: usize,
        text_len: usize,
    },

    #[error("utf-16 index {index} splits a surrogate pair")]
    SplitSurrogate { index: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
