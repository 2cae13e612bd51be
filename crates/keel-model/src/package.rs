// package.rs - The compiled context package and its integrity record.
//
// A package is produced only by the compiler and never mutated after it is
// sealed. Recompiling yields a new package with a higher `revision`.
//
// The integrity hash is SHA-256 over the canonical JSON encoding of the
// whole package with `package_metadata.integrity` removed. serde_json
// objects are BTreeMap-backed, so keys are emitted in sorted order and the
// encoding is stable between the compiler and any verifier. Because every
// field (including `project_id` and `package_id`) is hashed, editing any
// part of a package on disk breaks verification.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::app_spec::DataClassification;
use crate::control::ControlDomains;
use crate::environment::{ApprovalLevel, AutonomyMode, DeliveryStage, RiskLevel};
use crate::error::ModelError;

/// The only integrity algorithm this build produces and verifies.
pub const HASH_ALG: &str = "sha256";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledContextPackage {
    pub package_metadata: PackageMetadata,
    pub project_identity: ProjectIdentity,
    pub autonomy_policy: AutonomyPolicy,
    pub security_requirements: SecurityRequirements,
    pub network_requirements: NetworkRequirements,
    pub data_requirements: DataRequirements,
    /// Present only for AI-enabled projects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rai_requirements: Option<RaiRequirements>,
    pub required_tests: RequiredTests,
    pub approval_checkpoints: Vec<ApprovalCheckpoint>,
    #[serde(default)]
    pub evidence_requirements: Vec<String>,
    #[serde(default)]
    pub change_reassessment_triggers: Vec<String>,
    pub remediation_eligibility: RemediationEligibility,
    /// AIUC-1 controls after control overrides were applied.
    pub effective_controls: ControlDomains,
    /// IDs of exceptions active at compile time.
    #[serde(default)]
    pub exceptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub package_id: Uuid,
    pub project_id: String,
    /// Monotonic per project. The latest package is the one with the
    /// highest revision.
    pub revision: u64,
    pub compiled_at: DateTime<Utc>,
    pub compiler_version: String,
    pub sources: SourceDocuments,
    pub integrity: IntegrityRecord,
}

/// Which document versions a package was compiled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocuments {
    pub org_baseline: DocumentRef,
    pub app_spec: DocumentRef,
    pub environment_profile: DocumentRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub version: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    pub hash: String,
    pub hash_alg: String,
    /// Set by an external signer; the compiler always writes `false`.
    #[serde(default)]
    pub signed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIdentity {
    pub project_id: String,
    pub environment: String,
    pub delivery_stage: DeliveryStage,
    pub risk_level: RiskLevel,
    pub approval_level: ApprovalLevel,
    pub ai_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutonomyPolicy {
    pub mode: AutonomyMode,
    pub allowed_actions: Vec<String>,
    pub blocked_actions: Vec<String>,
    pub approval_required_for: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRequirements {
    pub forbid_hardcoded_secrets: bool,
    pub require_code_review: bool,
    pub require_sast: bool,
    pub require_dependency_scan: bool,
    pub require_mfa: bool,
    pub least_privilege: bool,
    pub forbid_wildcard_permissions: bool,
    #[serde(default)]
    pub banned_functions: Vec<String>,
    #[serde(default)]
    pub prohibited_patterns: Vec<ProhibitedPattern>,
}

/// A regular expression that must not appear on an added diff line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProhibitedPattern {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRequirements {
    pub deny_by_default: bool,
    pub require_tls: bool,
    /// Exact host names or glob patterns (`*.internal.example.com`).
    #[serde(default)]
    pub outbound_allowlist: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequirements {
    pub forbid_pii_in_logs: bool,
    pub encryption_at_rest: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,
    #[serde(default)]
    pub classifications: Vec<DataClassification>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaiRequirements {
    pub human_oversight: bool,
    pub fairness_assessment_required: bool,
    /// Data that must never be placed in a model's context window.
    #[serde(default)]
    pub prohibited_in_model_context: Vec<String>,
    #[serde(default)]
    pub required_reviews: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredTests {
    #[serde(default)]
    pub security: Vec<String>,
    #[serde(default)]
    pub rai: Vec<String>,
    #[serde(default)]
    pub functional: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalCheckpoint {
    pub checkpoint: String,
    pub required_roles: Vec<String>,
}

/// Whether gate failures may be handed to an agent for remediation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationEligibility {
    pub auto_remediation_allowed: bool,
    pub human_review_required: bool,
    /// Rule types whose failures must be fixed by a human.
    #[serde(default)]
    pub excluded_rule_types: Vec<String>,
}

impl RemediationEligibility {
    pub fn allows(&self, rule_type: &str) -> bool {
        self.auto_remediation_allowed && !self.excluded_rule_types.iter().any(|r| r == rule_type)
    }
}

impl CompiledContextPackage {
    pub fn project_id(&self) -> &str {
        &self.package_metadata.project_id
    }

    pub fn package_id(&self) -> Uuid {
        self.package_metadata.package_id
    }

    pub fn revision(&self) -> u64 {
        self.package_metadata.revision
    }

    pub fn integrity(&self) -> &IntegrityRecord {
        &self.package_metadata.integrity
    }

    /// Compute the content hash, ignoring the stored integrity record.
    pub fn compute_hash(&self) -> Result<String, ModelError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(meta) = value
            .get_mut("package_metadata")
            .and_then(Value::as_object_mut)
        {
            meta.remove("integrity");
        }
        let canonical = serde_json::to_vec(&value)?;
        Ok(format!("{:x}", Sha256::digest(&canonical)))
    }

    /// Stamp the integrity record. Called once by the compiler.
    pub fn seal(&mut self) -> Result<(), ModelError> {
        let hash = self.compute_hash()?;
        self.package_metadata.integrity = IntegrityRecord {
            hash,
            hash_alg: HASH_ALG.to_string(),
            signed: false,
        };
        Ok(())
    }

    /// Recompute the hash and compare it with the stored one.
    pub fn verify_integrity(&self) -> Result<(), ModelError> {
        let record = &self.package_metadata.integrity;
        if record.hash_alg != HASH_ALG {
            return Err(ModelError::UnsupportedHashAlgorithm {
                alg: record.hash_alg.clone(),
            });
        }
        let actual = self.compute_hash()?;
        if actual != record.hash {
            return Err(ModelError::IntegrityMismatch {
                expected: record.hash.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Write the package as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ModelError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a package file. Does not verify integrity; callers that act on
    /// the contents must call [`verify_integrity`](Self::verify_integrity).
    pub fn read_from(path: &Path) -> Result<Self, ModelError> {
        let data = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_package() -> CompiledContextPackage {
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
                    org_baseline: doc("base"),
                    app_spec: doc("spec"),
                    environment_profile: doc("env"),
                },
                integrity: IntegrityRecord::default(),
            },
            project_identity: ProjectIdentity {
                project_id: "payments-api".to_string(),
                environment: "dev".to_string(),
                delivery_stage: DeliveryStage::Development,
                risk_level: RiskLevel::Medium,
                approval_level: ApprovalLevel::Standard,
                ai_enabled: false,
            },
            autonomy_policy: AutonomyPolicy {
                mode: AutonomyMode::Supervised,
                allowed_actions: vec!["read_file".to_string()],
                blocked_actions: vec!["deploy_prod".to_string()],
                approval_required_for: vec!["modify_auth_flow".to_string()],
            },
            security_requirements: SecurityRequirements::default(),
            network_requirements: NetworkRequirements {
                deny_by_default: true,
                require_tls: true,
                outbound_allowlist: vec!["api.github.com".to_string()],
            },
            data_requirements: DataRequirements::default(),
            rai_requirements: None,
            required_tests: RequiredTests::default(),
            approval_checkpoints: vec![],
            evidence_requirements: vec![],
            change_reassessment_triggers: vec![],
            remediation_eligibility: RemediationEligibility::default(),
            effective_controls: ControlDomains::default(),
            exceptions: vec![],
        };
        package.seal().unwrap();
        package
    }

    #[test]
    fn sealed_package_verifies() {
        let package = sample_package();
        assert_eq!(package.integrity().hash_alg, HASH_ALG);
        assert_eq!(package.integrity().hash.len(), 64);
        package.verify_integrity().unwrap();
    }

    #[test]
    fn mutating_identity_fields_breaks_integrity() {
        let mut package = sample_package();
        package.package_metadata.project_id = "other".to_string();
        assert!(matches!(
            package.verify_integrity(),
            Err(ModelError::IntegrityMismatch { .. })
        ));

        let mut package = sample_package();
        package.package_metadata.package_id = Uuid::new_v4();
        assert!(package.verify_integrity().is_err());
    }

    #[test]
    fn mutating_policy_content_breaks_integrity() {
        let mut package = sample_package();
        package
            .autonomy_policy
            .allowed_actions
            .push("deploy_prod".to_string());
        assert!(package.verify_integrity().is_err());
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let mut package = sample_package();
        package.package_metadata.integrity.hash_alg = "md5".to_string();
        assert!(matches!(
            package.verify_integrity(),
            Err(ModelError::UnsupportedHashAlgorithm { .. })
        ));
    }

    #[test]
    fn file_round_trip_preserves_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".keel").join("package.json");
        let package = sample_package();
        package.write_to(&path).unwrap();

        let loaded = CompiledContextPackage::read_from(&path).unwrap();
        loaded.verify_integrity().unwrap();
        assert_eq!(loaded.integrity().hash, package.integrity().hash);
    }

    #[test]
    fn signed_flag_is_outside_the_hash() {
        let mut package = sample_package();
        package.package_metadata.integrity.signed = true;
        package.verify_integrity().unwrap();
    }
}
