// task.rs - Remediation task packets.
//
// The gate evaluator creates one packet per failing rule. An external agent
// claims it and reports an outcome. A packet is open until it carries a
// `completed_at` timestamp; at most one open packet exists per
// (project, rule).
//
//   Pending → InProgress → Completed | Partial | Failed
//   (Pending may also be closed directly)

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;
use crate::framework::Transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Partial,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Partial | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Partial => write!(f, "partial"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// One unit of remediation work for a failing gate rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPacket {
    pub packet_id: Uuid,
    pub project_id: String,
    pub gate_id: String,
    pub rule_id: String,
    pub rule_type: String,
    pub transition: Transition,
    pub title: String,
    pub failure_message: String,
    pub fix_guidance: String,
    pub priority: TaskPriority,
    /// The compiled package reserves this rule type for human remediation.
    #[serde(default)]
    pub human_only: bool,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskPacket {
    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }

    /// Claim a pending packet for an agent.
    pub fn claim(&mut self, agent_id: impl Into<String>) -> Result<(), ModelError> {
        if self.status != TaskStatus::Pending {
            return Err(self.invalid(TaskStatus::InProgress));
        }
        self.status = TaskStatus::InProgress;
        self.claimed_by = Some(agent_id.into());
        self.claimed_at = Some(Utc::now());
        Ok(())
    }

    /// Close the packet with a terminal status and an outcome summary.
    pub fn complete(&mut self, status: TaskStatus, outcome: impl Into<String>) -> Result<(), ModelError> {
        if !status.is_terminal() || self.status.is_terminal() {
            return Err(self.invalid(status));
        }
        self.status = status;
        self.outcome = Some(outcome.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn invalid(&self, to: TaskStatus) -> ModelError {
        ModelError::InvalidTaskTransition {
            packet_id: self.packet_id,
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet() -> TaskPacket {
        TaskPacket {
            packet_id: Uuid::new_v4(),
            project_id: "payments-api".to_string(),
            gate_id: "dev-to-preprod".to_string(),
            rule_id: "secrets".to_string(),
            rule_type: "no_secrets_detected".to_string(),
            transition: Transition::new("dev", "preprod"),
            title: "Fix: secrets".to_string(),
            failure_message: "2 open secret findings".to_string(),
            fix_guidance: "rotate".to_string(),
            priority: TaskPriority::High,
            human_only: false,
            status: TaskStatus::Pending,
            claimed_by: None,
            claimed_at: None,
            outcome: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn claim_then_complete_closes_packet() {
        let mut p = packet();
        assert!(p.is_open());
        p.claim("agent-7").unwrap();
        assert_eq!(p.status, TaskStatus::InProgress);
        assert_eq!(p.claimed_by.as_deref(), Some("agent-7"));
        p.complete(TaskStatus::Completed, "rotated keys").unwrap();
        assert!(!p.is_open());
    }

    #[test]
    fn cannot_claim_twice() {
        let mut p = packet();
        p.claim("a").unwrap();
        assert!(matches!(
            p.claim("b"),
            Err(ModelError::InvalidTaskTransition { .. })
        ));
    }

    #[test]
    fn cannot_complete_with_non_terminal_status_or_twice() {
        let mut p = packet();
        assert!(p.complete(TaskStatus::InProgress, "x").is_err());
        p.complete(TaskStatus::Partial, "half done").unwrap();
        assert!(p.complete(TaskStatus::Completed, "again").is_err());
    }
}
