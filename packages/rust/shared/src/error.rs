//! Error types for Triage.
//!
//! Library crates use [`TriageError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! A low-confidence classification is *not* an error; it is reported through
//! [`crate::Disposition::NeedsReview`].

use std::path::PathBuf;

/// Top-level error type for all Triage operations.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// The input is not a text, PDF or image document.
    #[error("unsupported file format: {detail}")]
    UnsupportedFormat { detail: String },

    /// The document produced no usable text.
    #[error("empty document: {source_label}")]
    EmptyDocument { source_label: String },

    /// The raw input exceeds the configured size limit.
    #[error("document too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// Text extraction collaborator failed or produced nothing.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Model training, loading or compatibility error.
    #[error("model error: {message}")]
    Model { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A background worker panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),

    /// Data validation error (bad sample file, invalid label, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TriageError>;

impl TriageError {
    /// Create an unsupported-format error.
    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            detail: detail.into(),
        }
    }

    /// Create an empty-document error for the given source label.
    pub fn empty(source_label: impl Into<String>) -> Self {
        Self::EmptyDocument {
            source_label: source_label.into(),
        }
    }

    /// Create a model error from any displayable message.
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
