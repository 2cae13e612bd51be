// config.rs - Gate evaluation configuration from .keel/gate.toml.
//
// Example:
//
// ```toml
// [remediation]
// enabled = true
// default_priority = "high"
//
// [fairness]
// max_evidence_age_days = 60
//
// [audit]
// log_path = ".keel/audit.jsonl"
// ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use keel_audit::{Auditor, JsonlAuditSink};
use keel_model::TaskPriority;
use serde::{Deserialize, Serialize};

use crate::error::GateError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub remediation: RemediationConfig,

    #[serde(default)]
    pub fairness: FairnessConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationConfig {
    /// Create task packets for failing rules.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Priority for failures whose rule family has no stronger default.
    #[serde(default)]
    pub default_priority: TaskPriority,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_priority: TaskPriority::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessConfig {
    /// Maximum age of attested fairness evidence when a rule sets none.
    #[serde(default = "default_max_evidence_age_days")]
    pub max_evidence_age_days: i64,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            max_evidence_age_days: default_max_evidence_age_days(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSONL audit log. No audit log is written when unset.
    pub log_path: Option<PathBuf>,
}

// Serde default functions
fn default_true() -> bool {
    true
}

fn default_max_evidence_age_days() -> i64 {
    90
}

impl GateConfig {
    /// Standard location under a project root: `.keel/gate.toml`.
    pub fn path_for_project(root: &Path) -> PathBuf {
        root.join(".keel").join("gate.toml")
    }

    pub fn load(path: &Path) -> Result<Self, GateError> {
        let content = std::fs::read_to_string(path).map_err(|source| GateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| GateError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate().map_err(|reason| GateError::Config {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// The evidence age limit must be a positive span chrono can represent.
    pub fn validate(&self) -> Result<(), String> {
        let days = self.fairness.max_evidence_age_days;
        let representable = chrono::Duration::try_days(days)
            .and_then(|age| chrono::Utc::now().checked_sub_signed(age))
            .is_some();
        if days <= 0 || !representable {
            return Err(format!(
                "fairness.max_evidence_age_days must be a positive day count, got {}",
                days
            ));
        }
        Ok(())
    }

    /// The auditor described by `[audit]`, resolving a relative log path
    /// against the project root.
    pub fn auditor(&self, project_root: &Path) -> Result<Auditor, GateError> {
        let Some(log_path) = &self.audit.log_path else {
            return Ok(Auditor::disabled());
        };
        let sink = JsonlAuditSink::open(project_root.join(log_path))?;
        Ok(Auditor::new(Arc::new(sink)))
    }

    /// Load config, falling back to defaults when the file does not exist.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, GateError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GateConfig::default();
        assert!(config.remediation.enabled);
        assert_eq!(config.remediation.default_priority, TaskPriority::Medium);
        assert_eq!(config.fairness.max_evidence_age_days, 90);
        assert!(config.audit.log_path.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = GateConfig::path_for_project(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "[remediation]\ndefault_priority = \"high\"\n\n[fairness]\nmax_evidence_age_days = 30\n",
        )
        .unwrap();

        let config = GateConfig::load(&path).unwrap();
        assert!(config.remediation.enabled);
        assert_eq!(config.remediation.default_priority, TaskPriority::High);
        assert_eq!(config.fairness.max_evidence_age_days, 30);
    }

    #[test]
    fn out_of_range_evidence_age_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.toml");
        std::fs::write(&path, "[fairness]\nmax_evidence_age_days = 1000000000\n").unwrap();
        match GateConfig::load(&path) {
            Err(GateError::Config { reason, .. }) => assert!(reason.contains("max_evidence_age_days")),
            other => panic!("expected Config error, got {:?}", other),
        }

        let mut config = GateConfig::default();
        config.fairness.max_evidence_age_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn audit_log_path_opens_a_sink() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GateConfig::default();
        assert!(config.auditor(dir.path()).is_ok());

        config.audit.log_path = Some(PathBuf::from(".keel/audit.jsonl"));
        let auditor = config.auditor(dir.path()).unwrap();
        auditor
            .emit(keel_audit::AuditEvent::new(
                "test",
                keel_audit::AuditAction::GateEvaluated,
            ))
            .unwrap();
        assert!(dir.path().join(".keel/audit.jsonl").exists());
    }

    #[test]
    fn missing_file_is_default_but_bad_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.toml");
        assert_eq!(GateConfig::load_or_default(&path).unwrap(), GateConfig::default());

        std::fs::write(&path, "[remediation\nenabled = maybe").unwrap();
        assert!(matches!(
            GateConfig::load_or_default(&path),
            Err(GateError::Config { .. })
        ));
    }
}
