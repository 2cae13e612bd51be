// error.rs - Error types for policy compilation.

use keel_model::{ModelError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    /// One of the three policy documents is absent. The compiler never
    /// proceeds with partial policy.
    #[error("cannot compile project '{project_id}': missing {document}")]
    MissingDocument {
        project_id: String,
        document: &'static str,
    },

    /// A document is present but invalid.
    #[error("invalid policy document: {0}")]
    InvalidDocument(#[from] ModelError),

    /// The document, exception or package store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
