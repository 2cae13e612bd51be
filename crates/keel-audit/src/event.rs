// event.rs - Audit event data model.
//
// Every governance decision is recorded as an AuditEvent. Events form a
// chain: each one carries `previous_hash`, the SHA-256 of the JSON line
// written before it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which decision this event records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A compiled context package was issued for a project.
    PackageCompiled,
    /// A promotion gate was evaluated.
    GateEvaluated,
    /// A remediation task packet was created for a failing rule.
    RemediationCreated,
    /// A promotion was requested (promoted, blocked or awaiting approval).
    PromotionRequested,
    /// The local engine answered an action check.
    ActionChecked,
    /// The local engine scanned a diff.
    DiffChecked,
    /// The local engine answered a network check.
    NetworkChecked,
    /// A package failed integrity verification.
    IntegrityFailure,
}

/// A single audit event: one line in the JSONL audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,

    /// Which component made the decision (e.g. "compiler", "gate", "local-engine").
    pub actor: String,

    /// What kind of decision was recorded.
    pub action: AuditAction,

    /// The project the decision concerns.
    pub project_id: Option<String>,

    /// What was decided on: an action name, a gate id, a host, a package id.
    pub subject: Option<String>,

    /// Short outcome label ("allow", "partial", "created", ...).
    pub outcome: Option<String>,

    /// Human-readable explanation naming the rule or policy clause.
    pub reason: Option<String>,

    /// Stamped by the log on append; `None` for the first line.
    pub previous_hash: Option<String>,

    /// Counts, ids and pattern names that do not fit the fields above.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn new(actor: impl Into<String>, action: AuditAction) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor: actor.into(),
            action,
            project_id: None,
            subject: None,
            outcome: None,
            reason: None,
            previous_hash: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the outcome label and its explanation.
    pub fn with_outcome(mut self, outcome: impl Into<String>, reason: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self.reason = Some(reason.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_round_trip() {
        let event = AuditEvent::new("gate", AuditAction::GateEvaluated)
            .with_project("payments-api")
            .with_subject("dev->preprod")
            .with_outcome("partial", "3 of 10 rules failed");

        let json = serde_json::to_string(&event).unwrap();
        let restored: AuditEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_id, restored.event_id);
        assert_eq!(restored.action, AuditAction::GateEvaluated);
        assert_eq!(restored.project_id.as_deref(), Some("payments-api"));
        assert_eq!(restored.outcome.as_deref(), Some("partial"));
    }

    #[test]
    fn action_serializes_as_snake_case() {
        let json = serde_json::to_string(&AuditAction::RemediationCreated).unwrap();
        assert_eq!(json, "\"remediation_created\"");
    }
}
