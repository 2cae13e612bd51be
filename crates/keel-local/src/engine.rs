// engine.rs - Offline policy decisions from a compiled context package.
//
// The LocalPolicyEngine answers the questions an agent asks on every tool
// call, using nothing but the package file fetched into `.keel/`:
//
//   check_action(action)  → blocked? approval required? allowed? else deny
//   check_diff(diff)      → prohibited patterns on added lines
//   check_network(host)   → outbound allowlist, else deny
//
// Every query goes through `policy()`, which re-reads the file only when
// its modification time changed and verifies the integrity hash on each
// read. A package that fails verification is dropped from the cache and
// every query fails until a valid package is in place. There is no
// degraded "unknown" answer.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use glob::{MatchOptions, Pattern};
use keel_audit::{hasher, AuditAction, AuditEvent, Auditor};
use keel_model::{CompiledContextPackage, ModelError, RequiredTests};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::LocalConfig;
use crate::diff::{DiffScanner, DiffViolation};
use crate::error::LocalPolicyError;
use crate::task_packet::{ScopedTaskPacket, TaskPacketGenerator, TaskRequest, TaskType};

/// The result of an action or network check. Every variant says why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PolicyDecision {
    Allow { reason: String },
    Block { reason: String },
    ApprovalRequired { reason: String },
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allow { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            PolicyDecision::Allow { reason }
            | PolicyDecision::Block { reason }
            | PolicyDecision::ApprovalRequired { reason } => reason,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PolicyDecision::Allow { .. } => "allow",
            PolicyDecision::Block { .. } => "block",
            PolicyDecision::ApprovalRequired { .. } => "approval_required",
        }
    }
}

/// Flat view of the enforced package for display and audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub project_id: String,
    pub package_id: String,
    pub revision: u64,
    pub compiled_at: String,
    pub environment: String,
    pub delivery_stage: String,
    pub risk_level: String,
    pub approval_level: String,
    pub autonomy_mode: String,
    pub ai_enabled: bool,
    pub allowed_actions: Vec<String>,
    pub blocked_actions: Vec<String>,
    pub approval_required_for: Vec<String>,
    pub outbound_allowlist: Vec<String>,
    pub prohibited_patterns: Vec<String>,
    pub required_test_count: usize,
    pub approval_checkpoints: Vec<String>,
    pub change_reassessment_triggers: Vec<String>,
    pub active_exceptions: usize,
    pub hash: String,
    pub hash_alg: String,
    pub signed: bool,
}

/// A verified package and the scanner built from its patterns.
#[derive(Debug)]
pub struct LoadedPolicy {
    pub package: CompiledContextPackage,
    scanner: DiffScanner,
}

#[derive(Debug)]
struct CachedPolicy {
    modified: SystemTime,
    policy: Arc<LoadedPolicy>,
}

pub struct LocalPolicyEngine {
    package_path: PathBuf,
    cache: RwLock<Option<CachedPolicy>>,
    auditor: Auditor,
    actor: String,
    generator: TaskPacketGenerator,
}

impl LocalPolicyEngine {
    /// Engine over the package at `package_path`. Nothing is read until the
    /// first query.
    pub fn new(package_path: impl Into<PathBuf>) -> Self {
        Self {
            package_path: package_path.into(),
            cache: RwLock::new(None),
            auditor: Auditor::disabled(),
            actor: "local-agent".to_string(),
            generator: TaskPacketGenerator::default(),
        }
    }

    pub fn from_config(config: &LocalConfig) -> Result<Self, LocalPolicyError> {
        Ok(Self::new(&config.package_path)
            .with_auditor(config.auditor()?)
            .with_actor(&config.actor)
            .with_generator(TaskPacketGenerator::new(config.context_budget)))
    }

    /// `.keel/local.toml` under `root`, or the standard layout.
    pub fn for_project(root: &Path) -> Result<Self, LocalPolicyError> {
        Self::from_config(&LocalConfig::load_for_project(root)?)
    }

    pub fn with_auditor(mut self, auditor: Auditor) -> Self {
        self.auditor = auditor;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn with_generator(mut self, generator: TaskPacketGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn package_path(&self) -> &Path {
        &self.package_path
    }

    /// The verified package currently enforced.
    pub fn package(&self) -> Result<Arc<LoadedPolicy>, LocalPolicyError> {
        self.policy()
    }

    pub fn check_action(&self, action: &str) -> Result<PolicyDecision, LocalPolicyError> {
        let policy = self.policy()?;
        let autonomy = &policy.package.autonomy_policy;
        let action = action.trim();
        let listed = |list: &[String]| list.iter().any(|a| a == action);

        let decision = if listed(&autonomy.blocked_actions) {
            PolicyDecision::Block {
                reason: format!("action '{}' is in blocked_actions", action),
            }
        } else if listed(&autonomy.approval_required_for) {
            PolicyDecision::ApprovalRequired {
                reason: format!("action '{}' is in approval_required_for", action),
            }
        } else if listed(&autonomy.allowed_actions) {
            PolicyDecision::Allow {
                reason: format!("action '{}' is in allowed_actions", action),
            }
        } else {
            PolicyDecision::Block {
                reason: format!(
                    "action '{}' is not listed in the package; blocked by deny-by-default",
                    action
                ),
            }
        };

        tracing::debug!(action = %action, decision = decision.label(), "action checked");
        self.audit(
            &policy.package,
            AuditAction::ActionChecked,
            action,
            decision.label(),
            decision.reason(),
            json!({}),
        );
        Ok(decision)
    }

    /// Prohibited patterns on added lines. Empty means clean.
    pub fn check_diff(&self, diff: &str) -> Result<Vec<DiffViolation>, LocalPolicyError> {
        let policy = self.policy()?;
        let violations = policy.scanner.scan(diff);

        let (outcome, reason) = if violations.is_empty() {
            ("clean", "no prohibited patterns on added lines".to_string())
        } else {
            (
                "violations",
                format!("{} prohibited pattern match(es)", violations.len()),
            )
        };
        tracing::debug!(violations = violations.len(), "diff checked");
        let patterns: Vec<&str> = violations.iter().map(|v| v.pattern.as_str()).collect();
        self.audit(
            &policy.package,
            AuditAction::DiffChecked,
            "diff",
            outcome,
            &reason,
            json!({
                "patterns": patterns,
                "diff_fingerprint": hasher::fingerprint(diff),
            }),
        );
        Ok(violations)
    }

    /// Allow only hosts on the outbound allowlist. Entries may be globs
    /// (`*.internal.example.com`); comparison ignores case, a trailing dot
    /// and a port.
    pub fn check_network(&self, host: &str) -> Result<PolicyDecision, LocalPolicyError> {
        let policy = self.policy()?;
        let normalized = normalize_host(host);
        let matched = policy
            .package
            .network_requirements
            .outbound_allowlist
            .iter()
            .find(|entry| host_matches(entry, &normalized));

        let decision = match matched {
            Some(entry) => PolicyDecision::Allow {
                reason: format!("host '{}' matches allowlist entry '{}'", normalized, entry),
            },
            None => PolicyDecision::Block {
                reason: format!(
                    "host '{}' is not on the outbound allowlist; blocked by deny-by-default",
                    normalized
                ),
            },
        };

        tracing::debug!(host = %normalized, decision = decision.label(), "network checked");
        self.audit(
            &policy.package,
            AuditAction::NetworkChecked,
            &normalized,
            decision.label(),
            decision.reason(),
            json!({}),
        );
        Ok(decision)
    }

    pub fn get_required_tests(&self, task_type: TaskType) -> Result<RequiredTests, LocalPolicyError> {
        let policy = self.policy()?;
        Ok(task_type.required_tests(&policy.package.required_tests))
    }

    pub fn get_policy_summary(&self) -> Result<PolicySummary, LocalPolicyError> {
        let policy = self.policy()?;
        Ok(summarize(&policy.package))
    }

    /// A task-scoped view of the enforced package.
    pub fn task_packet(&self, request: &TaskRequest) -> Result<ScopedTaskPacket, LocalPolicyError> {
        let policy = self.policy()?;
        Ok(self.generator.generate(&policy.package, request))
    }

    /// The package every query runs against.
    ///
    /// The file's modification time is the cache key. While it is unchanged
    /// the cached [`LoadedPolicy`] is shared through an `Arc`, so a query
    /// costs one `stat` call. When the file changes, the cache is cleared
    /// before the reload, so a package that no longer verifies is never
    /// served from a stale cache. Readers take the read lock; only a reload
    /// takes the write lock, and it checks again after acquiring it because
    /// another caller may already have reloaded.
    fn policy(&self) -> Result<Arc<LoadedPolicy>, LocalPolicyError> {
        let modified = std::fs::metadata(&self.package_path)
            .and_then(|m| m.modified())
            .map_err(|source| LocalPolicyError::Io {
                path: self.package_path.clone(),
                source,
            })?;

        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.as_ref() {
                if cached.modified == modified {
                    return Ok(cached.policy.clone());
                }
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have reloaded while we waited for the lock.
        if let Some(cached) = cache.as_ref() {
            if cached.modified == modified {
                return Ok(cached.policy.clone());
            }
        }
        *cache = None;

        let policy = Arc::new(self.load()?);
        tracing::info!(
            path = %self.package_path.display(),
            project_id = %policy.package.project_id(),
            revision = policy.package.revision(),
            "loaded context package"
        );
        *cache = Some(CachedPolicy {
            modified,
            policy: policy.clone(),
        });
        Ok(policy)
    }

    fn load(&self) -> Result<LoadedPolicy, LocalPolicyError> {
        let path = &self.package_path;
        let package =
            CompiledContextPackage::read_from(path).map_err(|source| LocalPolicyError::Load {
                path: path.clone(),
                source,
            })?;

        if let Err(e) = package.verify_integrity() {
            let reason = match &e {
                ModelError::IntegrityMismatch { expected, actual } => {
                    format!("stored {}, computed {}", expected, actual)
                }
                other => other.to_string(),
            };
            tracing::warn!(
                path = %path.display(),
                reason = %reason,
                "context package failed integrity check; refusing to enforce"
            );
            let event = AuditEvent::new(&self.actor, AuditAction::IntegrityFailure)
                .with_project(package.project_id())
                .with_subject(path.display().to_string())
                .with_outcome("refused", reason.clone());
            let _ignored = self.auditor.emit(event);
            return Err(LocalPolicyError::Integrity {
                path: path.clone(),
                reason,
            });
        }

        let scanner = DiffScanner::new(&package.security_requirements.prohibited_patterns)?;
        Ok(LoadedPolicy { package, scanner })
    }

    fn audit(
        &self,
        package: &CompiledContextPackage,
        action: AuditAction,
        subject: &str,
        outcome: &str,
        reason: &str,
        metadata: serde_json::Value,
    ) {
        let event = AuditEvent::new(&self.actor, action)
            .with_project(package.project_id())
            .with_subject(subject)
            .with_outcome(outcome, reason)
            .with_metadata(metadata);
        let _ignored = self.auditor.emit(event);
    }
}

impl std::fmt::Debug for LocalPolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPolicyEngine")
            .field("package_path", &self.package_path)
            .field("actor", &self.actor)
            .field("auditor", &self.auditor)
            .finish()
    }
}

fn summarize(package: &CompiledContextPackage) -> PolicySummary {
    let identity = &package.project_identity;
    let autonomy = &package.autonomy_policy;
    let integrity = package.integrity();
    let tests = &package.required_tests;
    PolicySummary {
        project_id: package.project_id().to_string(),
        package_id: package.package_id().to_string(),
        revision: package.revision(),
        compiled_at: package.package_metadata.compiled_at.to_rfc3339(),
        environment: identity.environment.clone(),
        delivery_stage: enum_label(&identity.delivery_stage),
        risk_level: identity.risk_level.to_string(),
        approval_level: identity.approval_level.to_string(),
        autonomy_mode: autonomy.mode.to_string(),
        ai_enabled: identity.ai_enabled,
        allowed_actions: autonomy.allowed_actions.clone(),
        blocked_actions: autonomy.blocked_actions.clone(),
        approval_required_for: autonomy.approval_required_for.clone(),
        outbound_allowlist: package.network_requirements.outbound_allowlist.clone(),
        prohibited_patterns: package
            .security_requirements
            .prohibited_patterns
            .iter()
            .map(|p| p.name.clone())
            .collect(),
        required_test_count: tests.security.len() + tests.rai.len() + tests.functional.len(),
        approval_checkpoints: package
            .approval_checkpoints
            .iter()
            .map(|c| c.checkpoint.clone())
            .collect(),
        change_reassessment_triggers: package.change_reassessment_triggers.clone(),
        active_exceptions: package.exceptions.len(),
        hash: integrity.hash.clone(),
        hash_alg: integrity.hash_alg.clone(),
        signed: integrity.signed,
    }
}

/// The serde name of a unit enum variant.
fn enum_label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

fn normalize_host(host: &str) -> String {
    let lowered = host.trim().to_lowercase();
    let bare = match lowered.strip_prefix('[') {
        // [::1]:8443
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None if lowered.matches(':').count() == 1 => {
            lowered.split(':').next().unwrap_or(&lowered)
        }
        None => &lowered,
    };
    bare.trim_end_matches('.').to_string()
}

fn host_matches(entry: &str, host: &str) -> bool {
    let entry = normalize_host(entry);
    if entry == host {
        return true;
    }
    if !entry.contains(['*', '?', '[']) {
        return false;
    }
    let opts = MatchOptions {
        case_sensitive: false,
        ..Default::default()
    };
    match Pattern::new(&entry) {
        Ok(p) => p.matches_with(host, opts),
        Err(_) => false,
    }
}
