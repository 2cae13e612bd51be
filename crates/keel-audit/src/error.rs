// error.rs - Error types for the audit trail.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("cannot open audit log {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("audit log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A line is not a valid audit event, or an event could not be encoded.
    #[error("audit event encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// `previous_hash` on `line` does not match the hash of the line before.
    #[error("audit chain broken at line {line}: expected previous_hash {expected}, found {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },

    /// A sink refused the event (lock poisoned, backend unavailable).
    #[error("audit sink unavailable: {0}")]
    SinkUnavailable(String),
}
