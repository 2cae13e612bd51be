// overrides.rs - Optional policy overrides carried by narrower documents.
//
// The org baseline states a value for every flag. The application spec and
// the environment profile may each override any subset of them; a `None`
// field means "no opinion" and defers to the broader document.

use serde::{Deserialize, Serialize};

/// Override layer for the org baseline's coding, IAM, network and data flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forbid_hardcoded_secrets: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forbid_private_keys: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_code_review: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_sast: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_dependency_scan: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_mfa: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub least_privilege: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forbid_wildcard_permissions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_egress_by_default: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_allowlist: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forbid_pii_in_logs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_at_rest: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,
}

impl PolicyOverrides {
    /// Stack a narrower layer on top of this one. Every explicit value in
    /// `narrower` wins; its `None`s fall through to `self`.
    pub fn beneath(&self, narrower: &PolicyOverrides) -> PolicyOverrides {
        PolicyOverrides {
            forbid_hardcoded_secrets: narrower.forbid_hardcoded_secrets.or(self.forbid_hardcoded_secrets),
            forbid_private_keys: narrower.forbid_private_keys.or(self.forbid_private_keys),
            require_code_review: narrower.require_code_review.or(self.require_code_review),
            require_sast: narrower.require_sast.or(self.require_sast),
            require_dependency_scan: narrower.require_dependency_scan.or(self.require_dependency_scan),
            require_mfa: narrower.require_mfa.or(self.require_mfa),
            least_privilege: narrower.least_privilege.or(self.least_privilege),
            forbid_wildcard_permissions: narrower
                .forbid_wildcard_permissions
                .or(self.forbid_wildcard_permissions),
            deny_egress_by_default: narrower.deny_egress_by_default.or(self.deny_egress_by_default),
            require_tls: narrower.require_tls.or(self.require_tls),
            outbound_allowlist: narrower
                .outbound_allowlist
                .clone()
                .or_else(|| self.outbound_allowlist.clone()),
            forbid_pii_in_logs: narrower.forbid_pii_in_logs.or(self.forbid_pii_in_logs),
            encryption_at_rest: narrower.encryption_at_rest.or(self.encryption_at_rest),
            retention_days: narrower.retention_days.or(self.retention_days),
        }
    }
}
