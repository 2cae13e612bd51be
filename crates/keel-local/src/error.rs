// error.rs - Error types for local policy enforcement.

use std::path::PathBuf;

use keel_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocalPolicyError {
    /// The package on disk does not match its recorded hash. The engine
    /// answers no queries until a valid package is in place.
    #[error("package at {path} failed integrity check: hash mismatch ({reason})")]
    Integrity { path: PathBuf, reason: String },

    /// The package file could not be read or parsed.
    #[error("failed to load package at {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A prohibited pattern in the package is not a valid regular expression.
    #[error("invalid prohibited pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("unknown task type '{value}'")]
    UnknownTaskType { value: String },

    #[error("invalid local config at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("audit error: {0}")]
    Audit(#[from] keel_audit::AuditError),
}
