// environment.rs - Environment risk profile.
//
// One profile per deployment stage. It is the narrowest policy layer: its
// explicit values override both the application spec and the org baseline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::overrides::PolicyOverrides;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    pub profile_id: String,
    pub project_id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Environment name, e.g. "sandbox", "dev", "preprod", "prod".
    pub environment: String,
    pub delivery_stage: DeliveryStage,
    pub risk_level: RiskLevel,
    pub autonomy_mode: AutonomyMode,
    #[serde(default)]
    pub allowed_capabilities: Vec<String>,
    #[serde(default)]
    pub blocked_capabilities: Vec<String>,
    /// Capabilities that need approval in this environment on top of the
    /// fixed always-approve list.
    #[serde(default)]
    pub approval_required: Vec<String>,
    #[serde(default)]
    pub approval_level: ApprovalLevel,
    #[serde(default)]
    pub policy_overrides: PolicyOverrides,
    #[serde(default)]
    pub control_overrides: BTreeMap<String, bool>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStage {
    Prototype,
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyMode {
    /// The agent only suggests; a human performs every change.
    Assist,
    /// The agent acts, a human reviews every change.
    Supervised,
    /// The agent acts within its allowed actions without per-change review.
    Autonomous,
}

impl fmt::Display for AutonomyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutonomyMode::Assist => write!(f, "assist"),
            AutonomyMode::Supervised => write!(f, "supervised"),
            AutonomyMode::Autonomous => write!(f, "autonomous"),
        }
    }
}

/// How much human sign-off an environment demands.
///
/// The derived `Ord` follows declaration order, which is the escalation
/// order: `minimal < standard < elevated < high < strict`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalLevel {
    Minimal,
    #[default]
    Standard,
    Elevated,
    High,
    Strict,
}

impl ApprovalLevel {
    pub const ALL: [ApprovalLevel; 5] = [
        ApprovalLevel::Minimal,
        ApprovalLevel::Standard,
        ApprovalLevel::Elevated,
        ApprovalLevel::High,
        ApprovalLevel::Strict,
    ];
}

impl fmt::Display for ApprovalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalLevel::Minimal => write!(f, "minimal"),
            ApprovalLevel::Standard => write!(f, "standard"),
            ApprovalLevel::Elevated => write!(f, "elevated"),
            ApprovalLevel::High => write!(f, "high"),
            ApprovalLevel::Strict => write!(f, "strict"),
        }
    }
}

impl EnvironmentProfile {
    /// A capability may not be both allowed and blocked.
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(capability) = self
            .allowed_capabilities
            .iter()
            .find(|c| self.blocked_capabilities.contains(c))
        {
            return Err(ModelError::CapabilityConflict {
                capability: capability.clone(),
                environment: self.environment.clone(),
            });
        }
        Ok(())
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ModelError> {
        serde_yaml::from_str(yaml).map_err(|e| ModelError::Malformed {
            document: "environment_profile".to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_levels_are_ordered() {
        assert!(ApprovalLevel::Minimal < ApprovalLevel::Standard);
        assert!(ApprovalLevel::Standard < ApprovalLevel::Elevated);
        assert!(ApprovalLevel::Elevated < ApprovalLevel::High);
        assert!(ApprovalLevel::High < ApprovalLevel::Strict);
    }

    #[test]
    fn overlapping_capabilities_are_rejected() {
        let yaml = r#"
profile_id: "prod-profile"
project_id: "payments-api"
environment: "prod"
delivery_stage: production
risk_level: high
autonomy_mode: supervised
allowed_capabilities: ["read_file", "run_tests"]
blocked_capabilities: ["run_tests"]
"#;
        let profile = EnvironmentProfile::from_yaml(yaml).unwrap();
        assert_eq!(profile.approval_level, ApprovalLevel::Standard);
        match profile.validate() {
            Err(ModelError::CapabilityConflict { capability, environment }) => {
                assert_eq!(capability, "run_tests");
                assert_eq!(environment, "prod");
            }
            other => panic!("expected CapabilityConflict, got {:?}", other),
        }
    }
}
