//! # keel-local
//!
//! Policy enforcement for an agent that works without a connection to the
//! governance service. Everything here runs against one compiled context
//! package on disk, normally `.keel/package.json`:
//!
//! - [`LocalPolicyEngine`] answers action, diff and network checks. Actions
//!   and hosts not named by the package are blocked (deny-by-default).
//! - [`TaskPacketGenerator`] cuts a task-scoped view out of the package
//!   before work starts.
//!
//! The engine verifies the package's integrity hash each time it loads the
//! file and refuses every query while verification fails.

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod task_packet;

pub use config::{ContextBudget, LocalConfig};
pub use diff::{DiffScanner, DiffViolation};
pub use engine::{LoadedPolicy, LocalPolicyEngine, PolicyDecision, PolicySummary};
pub use error::LocalPolicyError;
pub use task_packet::{ScopedTaskPacket, TaskPacketGenerator, TaskRequest, TaskType};

#[cfg(test)]
pub(crate) mod testing {
    use chrono::Utc;
    use keel_model::{
        ApprovalLevel, AutonomyMode, AutonomyPolicy, CompiledContextPackage, ControlDomains,
        DataRequirements, DeliveryStage, DocumentRef, IntegrityRecord, NetworkRequirements,
        PackageMetadata, ProhibitedPattern, ProjectIdentity, RaiRequirements,
        RemediationEligibility, RequiredTests, RiskLevel, SecurityRequirements, SourceDocuments,
    };
    use uuid::Uuid;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    /// A sealed package for payments-api in dev.
    pub(crate) fn package() -> CompiledContextPackage {
        let doc = |id: &str| DocumentRef {
            id: id.to_string(),
            version: 1,
        };
        let mut package = CompiledContextPackage {
            package_metadata: PackageMetadata {
                package_id: Uuid::new_v4(),
                project_id: "payments-api".to_string(),
                revision: 1,
                compiled_at: Utc::now(),
                compiler_version: "test".to_string(),
                sources: SourceDocuments {
                    org_baseline: doc("acme-baseline"),
                    app_spec: doc("payments-spec"),
                    environment_profile: doc("payments-dev"),
                },
                integrity: IntegrityRecord::default(),
            },
            project_identity: ProjectIdentity {
                project_id: "payments-api".to_string(),
                environment: "dev".to_string(),
                delivery_stage: DeliveryStage::Development,
                risk_level: RiskLevel::Medium,
                approval_level: ApprovalLevel::Standard,
                ai_enabled: true,
            },
            autonomy_policy: AutonomyPolicy {
                mode: AutonomyMode::Supervised,
                allowed_actions: names(&["read_file", "write_file", "run_migration"]),
                blocked_actions: names(&["deploy_prod"]),
                approval_required_for: names(&["modify_auth_flow"]),
            },
            security_requirements: SecurityRequirements {
                prohibited_patterns: vec![ProhibitedPattern {
                    name: "aws_access_key".to_string(),
                    pattern: r"AKIA[0-9A-Z]{16}".to_string(),
                    description: "AWS access key id".to_string(),
                }],
                ..SecurityRequirements::default()
            },
            network_requirements: NetworkRequirements {
                deny_by_default: true,
                require_tls: true,
                outbound_allowlist: names(&["api.github.com", "*.internal.example.com"]),
            },
            data_requirements: DataRequirements::default(),
            rai_requirements: Some(RaiRequirements {
                prohibited_in_model_context: names(&["customer_pii"]),
                ..RaiRequirements::default()
            }),
            required_tests: RequiredTests {
                security: names(&["sast", "secrets_scan"]),
                rai: names(&["bias_eval"]),
                functional: names(&["unit"]),
            },
            approval_checkpoints: vec![],
            evidence_requirements: vec![],
            change_reassessment_triggers: names(&["auth_flow_change", "network_policy_change"]),
            remediation_eligibility: RemediationEligibility::default(),
            effective_controls: ControlDomains::default(),
            exceptions: vec![],
        };
        package.seal().unwrap();
        package
    }
}
