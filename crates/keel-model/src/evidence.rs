// evidence.rs - Records produced by other subsystems and read by the gate.
//
// Findings come from scanners, approvals from the approval workflow,
// reports and scan targets from CI, fairness records from the RAI
// workflow. The core never writes them (except approval requests raised
// by `request_promotion`); it snapshots them into an evaluation context.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Open,
    Resolved,
    Suppressed,
    FalsePositive,
}

/// The scanner that reported a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingSource {
    pub tool_name: String,
    /// "secrets", "sast", "sca", "iac", "ai_security", ...
    pub tool_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub finding_id: String,
    pub project_id: String,
    pub title: String,
    pub severity: Severity,
    /// "secrets", "prompt_injection", "data_leakage", "dependency", ...
    pub category: String,
    pub source: FindingSource,
    #[serde(default)]
    pub compliance_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvss_score: Option<f64>,
    pub status: FindingStatus,
}

impl Finding {
    pub fn is_open(&self) -> bool {
        self.status == FindingStatus::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    /// An approved promotion request that has already authorized its
    /// promotion. It cannot authorize another.
    Consumed,
}

/// A human approval request ("security_review", "rai_review", "promotion").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: String,
    pub project_id: String,
    pub request_type: String,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub required_roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// An uploaded report: test results, SBOM, pentest, DPIA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub report_id: String,
    pub project_id: String,
    pub report_type: String,
    /// Framework control ids this report provides evidence for.
    #[serde(default)]
    pub control_refs: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ReportRecord {
    pub fn is_evidence_for(&self, control_id: &str) -> bool {
        self.control_refs.iter().any(|c| c == control_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanRunStatus {
    Passed,
    Failed,
    Running,
}

/// A repository, image or endpoint registered for scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub target_id: String,
    pub project_id: String,
    pub name: String,
    pub tool_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_status: Option<ScanRunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
}

/// The fairness case opened for an AI use case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairnessCase {
    pub case_id: String,
    pub project_id: String,
    pub use_case: String,
    #[serde(default)]
    pub protected_attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessMetric {
    pub name: String,
    pub threshold: f64,
}

/// Metrics and thresholds the fairness case must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessRequirements {
    pub case_id: String,
    #[serde(default)]
    pub metrics: Vec<FairnessMetric>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationStatus {
    Unattested,
    Attested,
    Rejected,
}

/// A bundle of collected fairness evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidencePackage {
    pub evidence_id: String,
    pub project_id: String,
    pub attestation_status: AttestationStatus,
    pub collected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl EvidencePackage {
    pub fn is_attested(&self) -> bool {
        self.attestation_status == AttestationStatus::Attested
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| e <= now)
    }
}

/// A production monitoring signal for a fairness metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSignal {
    pub signal_id: String,
    pub project_id: String,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    #[serde(default)]
    pub breached: bool,
    pub observed_at: DateTime<Utc>,
}

/// Proof that an agent worked under a specific compiled package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextReceipt {
    pub receipt_id: String,
    pub project_id: String,
    pub package_id: String,
    pub package_hash: String,
    pub recorded_at: DateTime<Utc>,
}

/// One finding as handed to the compliance-assessment collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceFindingInput {
    pub id: String,
    pub category: String,
    pub severity: Severity,
}

impl From<&Finding> for ComplianceFindingInput {
    fn from(finding: &Finding) -> Self {
        Self {
            id: finding.finding_id.clone(),
            category: finding.category.clone(),
            severity: finding.severity,
        }
    }
}

/// Result of a compliance assessment: an overall score (0-100) and a
/// per-framework breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAssessment {
    pub overall_score: f64,
    #[serde(default)]
    pub frameworks: BTreeMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn severity_orders_by_impact() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low > Severity::Info);
    }

    #[test]
    fn evidence_expiry() {
        let now = Utc::now();
        let mut evidence = EvidencePackage {
            evidence_id: "ev-1".to_string(),
            project_id: "p".to_string(),
            attestation_status: AttestationStatus::Attested,
            collected_at: now - Duration::days(10),
            expires_at: None,
        };
        assert!(!evidence.is_expired_at(now));
        evidence.expires_at = Some(now - Duration::days(1));
        assert!(evidence.is_expired_at(now));
        assert!(evidence.is_attested());
    }

    #[test]
    fn finding_parses_without_cvss() {
        let finding: Finding = serde_json::from_str(
            r#"{
                "finding_id": "f1", "project_id": "p", "title": "AWS key",
                "severity": "critical", "category": "secrets",
                "source": {"tool_name": "gitleaks", "tool_type": "secrets"},
                "status": "open"
            }"#,
        )
        .unwrap();
        assert!(finding.is_open());
        assert_eq!(finding.cvss_score, None);
        assert_eq!(ComplianceFindingInput::from(&finding).severity, Severity::Critical);
    }
}
