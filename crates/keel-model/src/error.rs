// error.rs - Error types for policy documents and collaborator stores.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing, validating or verifying policy artifacts.
#[derive(Debug, Error)]
pub enum ModelError {
    /// An org baseline is missing one of the six control domains.
    /// This is a structural error, never an "unset" control.
    #[error("org baseline is missing control domain '{domain}'")]
    MissingControlDomain { domain: String },

    /// A dotted control path names a domain that does not exist.
    #[error("unknown control domain '{domain}' in path '{path}'")]
    UnknownControlDomain { domain: String, path: String },

    /// A dotted control path is not of the form `domain.control`.
    #[error("invalid control path '{path}': expected 'domain.control'")]
    InvalidControlPath { path: String },

    /// A document could not be parsed.
    #[error("malformed {document}: {reason}")]
    Malformed { document: String, reason: String },

    /// An environment profile both allows and blocks the same capability.
    #[error("capability '{capability}' is both allowed and blocked in environment '{environment}'")]
    CapabilityConflict {
        capability: String,
        environment: String,
    },

    /// A transition string is not of the form `source->target`.
    #[error("invalid transition '{value}': expected 'source->target'")]
    InvalidTransition { value: String },

    /// A gate rule's parameters do not match its rule type.
    #[error("invalid parameters for rule '{rule_id}' ({rule_type}): {reason}")]
    InvalidRuleParams {
        rule_id: String,
        rule_type: String,
        reason: String,
    },

    /// The package's stored integrity hash disagrees with its contents.
    #[error("integrity hash mismatch: stored {expected}, computed {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    /// The package names a hash algorithm this build cannot verify.
    #[error("unsupported integrity hash algorithm '{alg}'")]
    UnsupportedHashAlgorithm { alg: String },

    /// A task packet state change that the lifecycle does not allow.
    #[error("invalid task transition from {from} to {to} for packet {packet_id}")]
    InvalidTaskTransition {
        packet_id: uuid::Uuid,
        from: String,
        to: String,
    },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors reported by a collaborator store (documents, findings, approvals,
/// persistence). The core treats them as opaque failures of the I/O boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or is in a broken state.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// A write conflicted with existing state.
    #[error("store conflict: {0}")]
    Conflict(String),

    /// A stored record could not be decoded.
    #[error(transparent)]
    Model(#[from] ModelError),
}
