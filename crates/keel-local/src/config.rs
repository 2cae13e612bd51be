// config.rs - Local enforcement configuration from .keel/local.toml.
//
// Every project using the local engine has the same layout:
//
//   .keel/
//     package.json   compiled context package, as fetched
//     local.toml     this config (optional)
//     audit.jsonl    decision audit log (when enabled)
//
// Relative paths in local.toml are resolved against the project root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use keel_audit::{Auditor, JsonlAuditSink};
use serde::{Deserialize, Serialize};

use crate::error::LocalPolicyError;

pub const KEEL_DIR: &str = ".keel";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Compiled context package to enforce.
    #[serde(default = "default_package_path")]
    pub package_path: PathBuf,

    /// Actor name recorded on audit events.
    #[serde(default = "default_actor")]
    pub actor: String,

    #[serde(default)]
    pub audit: AuditConfig,

    /// Budget handed to task packets that do not set their own.
    #[serde(default)]
    pub context_budget: ContextBudget,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSONL audit log. Decisions are not audited when unset.
    pub log_path: Option<PathBuf>,
}

/// Size hints for the context a task packet may occupy. Passed through to
/// consumers; nothing here enforces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<u32>,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            max_files: None,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            package_path: default_package_path(),
            actor: default_actor(),
            audit: AuditConfig::default(),
            context_budget: ContextBudget::default(),
        }
    }
}

// Serde default functions
fn default_package_path() -> PathBuf {
    PathBuf::from(KEEL_DIR).join("package.json")
}

fn default_actor() -> String {
    "local-agent".to_string()
}

fn default_max_tokens() -> u32 {
    8000
}

impl LocalConfig {
    /// The standard layout under `root`, with auditing to `.keel/audit.jsonl`.
    pub fn for_project(root: &Path) -> Self {
        Self {
            package_path: root.join(default_package_path()),
            audit: AuditConfig {
                log_path: Some(root.join(KEEL_DIR).join("audit.jsonl")),
            },
            ..Self::default()
        }
    }

    pub fn path_for_project(root: &Path) -> PathBuf {
        root.join(KEEL_DIR).join("local.toml")
    }

    pub fn load(path: &Path) -> Result<Self, LocalPolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| LocalPolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| LocalPolicyError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// `.keel/local.toml` under `root` with paths resolved against `root`,
    /// or [`for_project`](Self::for_project) when the file does not exist.
    pub fn load_for_project(root: &Path) -> Result<Self, LocalPolicyError> {
        let path = Self::path_for_project(root);
        if !path.exists() {
            return Ok(Self::for_project(root));
        }
        let mut config = Self::load(&path)?;
        config.package_path = root.join(&config.package_path);
        config.audit.log_path = config.audit.log_path.map(|p| root.join(p));
        Ok(config)
    }

    pub fn auditor(&self) -> Result<Auditor, LocalPolicyError> {
        match &self.audit.log_path {
            Some(path) => Ok(Auditor::new(Arc::new(JsonlAuditSink::open(path)?))),
            None => Ok(Auditor::disabled()),
        }
    }
}
