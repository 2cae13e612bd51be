// baseline.rs - Organization security baseline.
//
// The org baseline is the broadest policy layer. It defines every AIUC-1
// control domain plus the coding, IAM, network, data and testing defaults
// that the compiler turns into security requirements.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::control::{ControlDomain, ControlDomains};
use crate::error::ModelError;

/// Organization-wide security and AI-governance defaults.
///
/// ```yaml
/// baseline_id: "acme-2026"
/// org_id: "acme"
/// controls:
///   data_privacy: { pii_redaction: true }
///   security: { mfa_enforced: true, pentest_annual: null }
///   safety: { human_oversight: true }
///   reliability: {}
///   accountability: { model_cards: false }
///   society: {}
/// coding:
///   require_sast: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgBaseline {
    pub baseline_id: String,
    pub org_id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub controls: ControlDomains,
    #[serde(default)]
    pub coding: CodingPolicy,
    #[serde(default)]
    pub iam: IamPolicy,
    #[serde(default)]
    pub network: NetworkPolicy,
    #[serde(default)]
    pub data: DataPolicy,
    #[serde(default)]
    pub testing: TestingPolicy,
}

fn default_version() -> u32 {
    1
}

/// Secure-coding defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodingPolicy {
    pub forbid_hardcoded_secrets: bool,
    pub forbid_private_keys: bool,
    pub require_code_review: bool,
    pub require_sast: bool,
    pub require_dependency_scan: bool,
    /// Function names that must not be introduced (e.g. "eval", "pickle.loads").
    pub banned_functions: Vec<String>,
}

impl Default for CodingPolicy {
    fn default() -> Self {
        Self {
            forbid_hardcoded_secrets: true,
            forbid_private_keys: true,
            require_code_review: true,
            require_sast: false,
            require_dependency_scan: false,
            banned_functions: Vec::new(),
        }
    }
}

/// Identity and access defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IamPolicy {
    pub require_mfa: bool,
    pub least_privilege: bool,
    pub forbid_wildcard_permissions: bool,
}

/// Network egress defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPolicy {
    pub deny_egress_by_default: bool,
    pub require_tls: bool,
    pub outbound_allowlist: Vec<String>,
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self {
            deny_egress_by_default: true,
            require_tls: true,
            outbound_allowlist: Vec::new(),
        }
    }
}

/// Data-handling defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPolicy {
    pub forbid_pii_in_logs: bool,
    pub encryption_at_rest: bool,
    pub retention_days: Option<u32>,
}

/// Tests the organization requires beyond those derived from flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingPolicy {
    pub security: Vec<String>,
    pub rai: Vec<String>,
    pub functional: Vec<String>,
}

impl OrgBaseline {
    /// Parse a baseline from an untyped JSON value.
    ///
    /// The six control domains are checked before typed decoding so a
    /// missing domain is reported by name instead of as a generic
    /// "missing field" error.
    pub fn from_json_value(value: Value) -> Result<Self, ModelError> {
        let controls = value
            .get("controls")
            .and_then(Value::as_object)
            .ok_or_else(|| ModelError::Malformed {
                document: "org_baseline".to_string(),
                reason: "missing 'controls' object".to_string(),
            })?;

        for domain in ControlDomain::ALL {
            if !controls.contains_key(domain.as_str()) {
                return Err(ModelError::MissingControlDomain {
                    domain: domain.as_str().to_string(),
                });
            }
        }

        serde_json::from_value(value).map_err(|e| ModelError::Malformed {
            document: "org_baseline".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let value: Value = serde_json::from_str(json).map_err(|e| ModelError::Malformed {
            document: "org_baseline".to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_value(value)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ModelError> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| ModelError::Malformed {
            document: "org_baseline".to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_value(value)
    }
}
