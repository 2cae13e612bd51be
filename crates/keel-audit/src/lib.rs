//! # keel-audit
//!
//! Decision audit trail for the Keel policy engine.
//!
//! Every governance decision (package compiled, gate evaluated, remediation
//! packet created, agent action checked) can be recorded as an
//! [`AuditEvent`] in a JSONL log. Each line carries the SHA-256 of the line
//! before it, so inserting, deleting or editing events breaks the chain.
//!
//! Auditing is a side channel. The [`Auditor`] wraps an optional
//! [`AuditSink`] and never lets a failed write change the outcome of the
//! decision being recorded.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use keel_audit::{AuditAction, AuditEvent, AuditLog};
//!
//! let mut log = AuditLog::open("/tmp/keel-audit.jsonl").unwrap();
//! let mut event = AuditEvent::new("local-engine", AuditAction::ActionChecked)
//!     .with_project("payments-api")
//!     .with_subject("deploy_to_prod")
//!     .with_outcome("block", "action 'deploy_to_prod' is in blocked_actions");
//! log.append(&mut event).unwrap();
//! ```

pub mod error;
pub mod event;
pub mod hasher;
pub mod log;
pub mod sink;

pub use error::AuditError;
pub use event::{AuditAction, AuditEvent};
pub use log::AuditLog;
pub use sink::{AuditSink, Auditor, JsonlAuditSink, MemoryAuditSink};
