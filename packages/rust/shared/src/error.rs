//! Error types for docsync.
//!
//! Library crates use [`DocsyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docsync operations.
#[derive(Debug, thiserror::Error)]
pub enum DocsyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure talking to the retrieval service.
    #[error("network error: {0}")]
    Network(String),

    /// The retrieval service answered with a non-success status.
    #[error("API error {status} for {method} {path}: {detail}")]
    Api {
        status: u16,
        method: String,
        path: String,
        detail: String,
    },

    /// Parsing error (nav JSON, schema snapshots, API payloads).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad partition name, unknown doc ref, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Sync runtime failure (missing ids, indexing failures, poll timeout).
    #[error("sync error: {0}")]
    Sync(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocsyncError>;

impl DocsyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a sync error from any displayable message.
    pub fn sync(msg: impl Into<String>) -> Self {
        Self::Sync(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
