// error.rs - Error types for gate evaluation and promotion.

use std::path::PathBuf;

use keel_model::{ModelError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("project not found: {project_id}")]
    ProjectNotFound { project_id: String },

    /// The project is not in the gate's source environment.
    #[error(
        "gate '{gate_id}' promotes from '{expected}', but project '{project_id}' is in '{actual}'"
    )]
    WrongSourceEnvironment {
        gate_id: String,
        project_id: String,
        expected: String,
        actual: String,
    },

    /// A collaborator store failed. Nothing was persisted if this came from
    /// context assembly.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid gate config at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("audit error: {0}")]
    Audit(#[from] keel_audit::AuditError),
}
