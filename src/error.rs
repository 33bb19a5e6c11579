//! Error types for the task tracker
//!
//! Every core error aborts the current command and maps to exit code 1.
//! The JSON failure envelope carries the message plus a stable `kind` tag.

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the task CLI
pub mod exit_codes {
    pub const FAILURE: i32 = 1;
}

/// Main error type for task tracker operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Invalid task format in {}: {message}", .path.display())]
    Format { path: PathBuf, message: String },

    #[error("{0}")]
    Structural(String),

    #[error("Ambiguous task reference '{input}': {}", .candidates.join(", "))]
    AmbiguousReference {
        input: String,
        candidates: Vec<String>,
    },

    #[error("{0}")]
    Validation(String),

    #[error("No {dir} found from {}. Run 'task init' first.", .start.display())]
    StoreNotFound { dir: String, start: PathBuf },

    #[error("{} already exists", .0.display())]
    AlreadyInitialized(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Lock acquisition failed: {}", .0.display())]
    LockFailed(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Build a format error for the record stored at `path`
    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        exit_codes::FAILURE
    }

    /// Stable machine-readable tag for the error class
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Format { .. } => "format",
            Error::Structural(_) => "structural",
            Error::AmbiguousReference { .. } => "ambiguous_reference",
            Error::Validation(_) => "validation",
            Error::StoreNotFound { .. } => "store_not_found",
            Error::AlreadyInitialized(_) => "already_initialized",
            Error::InvalidConfig(_) => "invalid_config",
            Error::LockFailed(_) => "lock_failed",
            Error::Io(_) | Error::Json(_) | Error::TomlParse(_) | Error::TomlSerialize(_) => {
                "operation_failed"
            }
        }
    }

    /// Structured details for errors that carry more than a message
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::AmbiguousReference { input, candidates } => Some(serde_json::json!({
                "input": input,
                "candidates": candidates,
            })),
            Error::Format { path, .. } => Some(serde_json::json!({
                "path": path.display().to_string(),
            })),
            _ => None,
        }
    }
}

/// Result type alias for task tracker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub ok: bool,
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            ok: false,
            error: err.to_string(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
