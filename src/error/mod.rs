//! Error types and Result aliases for Courier.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using Courier's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Courier operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Upload error.
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// The watch root disappeared while monitoring. Fatal for the pipeline.
    #[error("watch root lost: '{path}'")]
    RootLost { path: String },

    /// Invalid glob pattern in configuration.
    #[error("invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Initial directory scan failed.
    #[error("scan failed for '{path}': {reason}")]
    ScanFailed { path: String, reason: String },
}

/// Upload errors, classified the way the retry policy consumes them.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Server rejected the request with a non-retryable status (4xx).
    #[error("rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Transient failure: 5xx, 429, timeout, or connection-level error.
    #[error("transient failure: {reason}")]
    Transient { reason: String },

    /// Source file disappeared between admission and read.
    #[error("source file vanished: '{path}'")]
    Vanished { path: String },
}

impl UploadError {
    /// Whether the retry policy may retry this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
