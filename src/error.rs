//! Error types for Taskforge
//!
//! This module defines all error types used throughout the descriptor
//! compiler and plugin registry. Uses `thiserror` for ergonomic error
//! handling with automatic `Display` and `Error` trait implementations.
//!
//! Validation failures are data, not errors: `Schema::validate` returns them
//! as a list. They only become an error (`SchemaValidation`) when a caller
//! explicitly asks for strict mode.

use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::ValidationError;

/// The primary error type for Taskforge operations.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// The schema document could not be read or parsed, or is not a valid schema.
    #[error("Schema load error: {0}")]
    SchemaLoad(String),

    /// The descriptor document could not be read or is not a JSON object.
    #[error("Descriptor load error: {0}")]
    DescriptorLoad(String),

    /// Strict-mode validation failed; carries every validation error found.
    #[error("Descriptor failed validation with {} error(s): {}", .0.len(), summarize(.0))]
    SchemaValidation(Vec<ValidationError>),

    /// A template could not be evaluated against the descriptor.
    #[error("Generation error in template '{template}': {message}")]
    Generation {
        /// Name of the template being rendered.
        template: String,
        /// What went wrong (usually the unresolved placeholder).
        message: String,
    },

    /// A generated definition could not be turned into a usable task type.
    #[error("Load error: {0}")]
    Load(String),

    /// The help page could not be written to the public help root.
    #[error("Failed to publish help file {}: {source}", path.display())]
    HelpPublish {
        /// Target help file path.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// Exporting an artifact set to disk failed part way.
    #[error("Failed to export artifact to {}: {source}", path.display())]
    Export {
        /// Path being created or written when the failure happened.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// A version switcher was bound while it knows no versions at all.
    #[error("No versions registered for '{0}'")]
    NoKnownVersions(String),

    /// A switched task instance was asked to bind a second time.
    #[error("Task '{0}' is already bound to a version")]
    AlreadyBound(String),

    /// External tool store failures.
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForgeError {
    /// Validation errors carried by a strict-mode failure, if this is one.
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            ForgeError::SchemaValidation(errors) => Some(errors),
            _ => None,
        }
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A specialized `Result` type for Taskforge operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
