//! Error types for spec-decode.

use thiserror::Error;

/// Result type alias for spec-decode operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for spec-decode.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed generation settings, rejected before decoding starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// A cache was asked to drop more positions than it holds.
    ///
    /// This always indicates broken bookkeeping in the caller and is never
    /// clamped.
    #[error("invalid prune: requested {requested} positions but cache has seen {seen}")]
    InvalidPrune { requested: usize, seen: usize },

    /// The wrapped model failed. Passed through untouched.
    #[error(transparent)]
    Adapter(Box<dyn std::error::Error + Send + Sync>),

    /// A distribution could not be sampled from (all-zero or non-finite
    /// weights). Raised mid-generation.
    #[error("sampling error: {0}")]
    Sampling(String),

    /// A model returned scores with an unexpected shape.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an error raised by a model implementation.
    pub fn adapter(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Adapter(err.into())
    }
}
