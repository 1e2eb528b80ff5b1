//! Common types and utilities shared across Lynks crates.
//!
//! This crate defines the error taxonomy and observability helpers used
//! throughout the Lynks utility workspace. It stays dependency-light so every
//! other crate can depend on it.
//!
//! # Overview
//!
//! - [`LynksError`] and [`Result`]: shared error handling for the extraction
//!   and activation tasks
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! Classifying a failure at a task boundary:
//!
//! ```rust
//! use lynks_common::LynksError;
//!
//! let err = LynksError::Extraction {
//!     url: "https://example.com".into(),
//!     reason: "document has no body".into(),
//! };
//! assert_eq!(err.kind(), "extraction");
//! assert!(err.to_string().contains("https://example.com"));
//! ```
use std::path::PathBuf;

pub mod observability;

/// Error types used across the Lynks utilities.
#[derive(thiserror::Error, Debug)]
pub enum LynksError {
    /// A value could not be embedded into a generated unit without changing its meaning.
    #[error("Render error for `{placeholder}`: {reason}")]
    Render { placeholder: String, reason: String },

    /// The evaluation context failed to start or did not run to completion.
    #[error("Execution error running `{command}` (exit code {}): {detail}", exit_label(.code))]
    Execution {
        command: String,
        code: Option<i32>,
        detail: String,
    },

    /// The extraction engine rejected or could not process the content.
    #[error("Extraction error for {url}: {reason}")]
    Extraction { url: String, reason: String },

    /// The output file could not be written or read back.
    #[error("Persistence error at {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A database operation failed.
    #[error("Database error during {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl LynksError {
    /// Short, stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            LynksError::Render { .. } => "render",
            LynksError::Execution { .. } => "execution",
            LynksError::Extraction { .. } => "extraction",
            LynksError::Persistence { .. } => "persistence",
            LynksError::Configuration(_) => "configuration",
            LynksError::Database { .. } => "database",
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Convenient alias for results that use [`LynksError`].
pub type Result<T> = std::result::Result<T, LynksError>;
