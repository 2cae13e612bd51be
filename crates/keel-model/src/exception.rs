// exception.rs - Time-boxed, human-approved policy deviations.
//
// Exceptions are created by an external approval workflow. The core only
// reads them. An exception whose `expires_at` has passed is inactive even
// if its stored status still says `active`; no cleanup job is needed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    pub exception_id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub scope: ExceptionScope,
    #[serde(default)]
    pub compensating_controls: Vec<String>,
    pub status: ExceptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// What the exception waives. Empty lists mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExceptionScope {
    pub environments: Vec<String>,
    pub components: Vec<String>,
    /// Control ids (framework controls or dotted AIUC-1 paths).
    pub controls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionStatus {
    Requested,
    Active,
    Revoked,
    Expired,
}

impl Exception {
    /// Active means approved and not yet expired at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ExceptionStatus::Active && self.expires_at > now
    }

    pub fn applies_to_environment(&self, environment: &str) -> bool {
        self.scope.environments.is_empty()
            || self.scope.environments.iter().any(|e| e == environment)
    }

    /// Whether this exception waives the given control. An exception with
    /// no listed controls waives none: control waivers must be explicit.
    pub fn covers_control(&self, control_id: &str) -> bool {
        self.scope.controls.iter().any(|c| c == control_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn exception(status: ExceptionStatus, expires_in_hours: i64) -> Exception {
        Exception {
            exception_id: "exc-1".to_string(),
            project_id: "payments-api".to_string(),
            title: "Legacy TLS endpoint".to_string(),
            scope: ExceptionScope {
                environments: vec!["dev".to_string()],
                components: vec![],
                controls: vec!["SC-8".to_string()],
            },
            compensating_controls: vec!["network isolation".to_string()],
            status,
            approved_by: Some("ciso".to_string()),
            expires_at: Utc::now() + Duration::hours(expires_in_hours),
        }
    }

    #[test]
    fn expired_exception_is_inactive_despite_status() {
        let expired = exception(ExceptionStatus::Active, -1);
        assert!(!expired.is_active_at(Utc::now()));
    }

    #[test]
    fn active_unexpired_exception_is_active() {
        assert!(exception(ExceptionStatus::Active, 24).is_active_at(Utc::now()));
        assert!(!exception(ExceptionStatus::Revoked, 24).is_active_at(Utc::now()));
    }

    #[test]
    fn scope_matching() {
        let exc = exception(ExceptionStatus::Active, 24);
        assert!(exc.applies_to_environment("dev"));
        assert!(!exc.applies_to_environment("prod"));
        assert!(exc.covers_control("SC-8"));
        assert!(!exc.covers_control("AC-2"));
    }
}
