// compiler.rs - Context Compiler.
//
// Compiles three layered policy documents into a CompiledContextPackage:
// 1. Checks all three documents are present (no partial policy)
// 2. Merges flags with precedence environment > app spec > org baseline
// 3. Applies control overrides to the AIUC-1 controls in the same order
// 4. Derives the autonomy policy, requirements, tests and checkpoints
// 5. Attaches active exception ids and seals the integrity hash
//
// The key invariant: an action that is blocked never appears in
// `allowed_actions` or `approval_required_for`. Blocking always wins.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use keel_model::{
    ApplicationSpec, ApprovalLevel, AutonomyMode, AutonomyPolicy, CompiledContextPackage, Control,
    ControlDomains, ControlPath, DataRequirements, DeliveryStage, DocumentRef, EnvironmentProfile,
    Exception, IntegrityRecord, NetworkRequirements, OrgBaseline, PackageMetadata,
    PolicyOverrides, ProjectIdentity, RaiRequirements, RemediationEligibility, RequiredTests,
    RiskLevel, SecurityRequirements, SourceDocuments,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CompileError;
use crate::escalation::approval_checkpoints;
use crate::patterns::{prohibited_patterns, PatternFlags};

/// Actions that require human approval in every environment.
pub const ALWAYS_APPROVE: [&str; 3] = [
    "modify_auth_flow",
    "modify_network_policy",
    "modify_data_retention",
];

/// Changes that invalidate the package and call for recompilation.
const REASSESSMENT_TRIGGERS: [&str; 5] = [
    "auth_flow_change",
    "network_policy_change",
    "data_retention_change",
    "new_data_classification",
    "new_trust_boundary",
];

const AI_REASSESSMENT_TRIGGERS: [&str; 2] = ["model_change", "prompt_template_change"];

/// Rule types whose failures need a human, never an agent.
const HUMAN_ONLY_RULE_TYPES: [&str; 4] = [
    "approval_present",
    "no_pending_approvals",
    "security_review_approved",
    "rai_review_approved",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Attach the ids of active exceptions to the package (default true).
    pub include_exceptions: bool,

    /// Instant used to decide exception expiry. Defaults to now.
    pub evaluated_at: Option<DateTime<Utc>>,

    /// Recorded in package metadata.
    pub compiler_version: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            include_exceptions: true,
            evaluated_at: None,
            compiler_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The documents and state one compilation reads.
///
/// Documents are `Option` so absence is reported by the compiler itself,
/// naming the missing document, rather than by each caller.
#[derive(Debug, Clone, Copy)]
pub struct CompileInput<'a> {
    pub project_id: &'a str,
    pub org_baseline: Option<&'a OrgBaseline>,
    pub app_spec: Option<&'a ApplicationSpec>,
    pub environment_profile: Option<&'a EnvironmentProfile>,
    /// Candidate exceptions. Expired or out-of-scope ones are dropped.
    pub exceptions: &'a [Exception],
    pub revision: u64,
}

/// Flags after precedence merging.
struct MergedFlags {
    forbid_hardcoded_secrets: bool,
    forbid_private_keys: bool,
    require_code_review: bool,
    require_sast: bool,
    require_dependency_scan: bool,
    require_mfa: bool,
    least_privilege: bool,
    forbid_wildcard_permissions: bool,
    deny_egress_by_default: bool,
    require_tls: bool,
    outbound_allowlist: Vec<String>,
    forbid_pii_in_logs: bool,
    encryption_at_rest: bool,
    retention_days: Option<u32>,
}

impl MergedFlags {
    fn merge(base: &OrgBaseline, overrides: &PolicyOverrides) -> Self {
        Self {
            forbid_hardcoded_secrets: overrides
                .forbid_hardcoded_secrets
                .unwrap_or(base.coding.forbid_hardcoded_secrets),
            forbid_private_keys: overrides
                .forbid_private_keys
                .unwrap_or(base.coding.forbid_private_keys),
            require_code_review: overrides
                .require_code_review
                .unwrap_or(base.coding.require_code_review),
            require_sast: overrides.require_sast.unwrap_or(base.coding.require_sast),
            require_dependency_scan: overrides
                .require_dependency_scan
                .unwrap_or(base.coding.require_dependency_scan),
            require_mfa: overrides.require_mfa.unwrap_or(base.iam.require_mfa),
            least_privilege: overrides.least_privilege.unwrap_or(base.iam.least_privilege),
            forbid_wildcard_permissions: overrides
                .forbid_wildcard_permissions
                .unwrap_or(base.iam.forbid_wildcard_permissions),
            deny_egress_by_default: overrides
                .deny_egress_by_default
                .unwrap_or(base.network.deny_egress_by_default),
            require_tls: overrides.require_tls.unwrap_or(base.network.require_tls),
            outbound_allowlist: overrides
                .outbound_allowlist
                .clone()
                .unwrap_or_else(|| base.network.outbound_allowlist.clone()),
            forbid_pii_in_logs: overrides
                .forbid_pii_in_logs
                .unwrap_or(base.data.forbid_pii_in_logs),
            encryption_at_rest: overrides
                .encryption_at_rest
                .unwrap_or(base.data.encryption_at_rest),
            retention_days: overrides.retention_days.or(base.data.retention_days),
        }
    }
}

/// The Context Compiler: layered documents in, sealed package out.
pub struct ContextCompiler;

impl ContextCompiler {
    /// Merge the three layers into one package and seal it.
    ///
    /// The org baseline supplies every value first. Overrides from the
    /// application spec replace baseline values, and overrides from the
    /// environment profile replace both. All three documents must be
    /// present; a missing one is `MissingDocument`, never a partial package.
    ///
    /// The package is stamped with `input.revision` as given. Picking the
    /// next free revision is [`CompileService`]'s job. The integrity hash is
    /// computed last, over the canonical JSON of everything else, so any
    /// later edit to the package fails `verify_integrity`.
    ///
    /// [`CompileService`]: crate::CompileService
    pub fn compile(
        input: &CompileInput<'_>,
        options: &CompilerOptions,
    ) -> Result<CompiledContextPackage, CompileError> {
        let missing = |document: &'static str| CompileError::MissingDocument {
            project_id: input.project_id.to_string(),
            document,
        };
        let base = input.org_baseline.ok_or_else(|| missing("org_baseline"))?;
        let app = input.app_spec.ok_or_else(|| missing("app_spec"))?;
        let env = input
            .environment_profile
            .ok_or_else(|| missing("environment_profile"))?;

        app.validate()?;
        env.validate()?;

        let now = options.evaluated_at.unwrap_or_else(Utc::now);
        let overrides = app.policy_overrides.beneath(&env.policy_overrides);
        let flags = MergedFlags::merge(base, &overrides);
        let controls = Self::effective_controls(base, app, env)?;
        let ai_enabled = app.is_ai_enabled();

        let security_requirements = SecurityRequirements {
            forbid_hardcoded_secrets: flags.forbid_hardcoded_secrets,
            require_code_review: flags.require_code_review,
            require_sast: flags.require_sast,
            require_dependency_scan: flags.require_dependency_scan,
            require_mfa: flags.require_mfa,
            least_privilege: flags.least_privilege,
            forbid_wildcard_permissions: flags.forbid_wildcard_permissions,
            banned_functions: base.coding.banned_functions.clone(),
            prohibited_patterns: prohibited_patterns(&PatternFlags {
                forbid_hardcoded_secrets: flags.forbid_hardcoded_secrets,
                forbid_private_keys: flags.forbid_private_keys,
                forbid_pii_in_logs: flags.forbid_pii_in_logs,
                banned_functions: &base.coding.banned_functions,
            }),
        };

        let rai_requirements = ai_enabled.then(|| Self::rai_requirements(app, env, &controls));

        let exceptions = if options.include_exceptions {
            let mut ids: Vec<String> = input
                .exceptions
                .iter()
                .filter(|e| e.project_id == input.project_id)
                .filter(|e| e.is_active_at(now) && e.applies_to_environment(&env.environment))
                .map(|e| e.exception_id.clone())
                .collect();
            ids.sort();
            ids.dedup();
            ids
        } else {
            Vec::new()
        };

        let mut package = CompiledContextPackage {
            package_metadata: PackageMetadata {
                package_id: Uuid::new_v4(),
                project_id: input.project_id.to_string(),
                revision: input.revision,
                compiled_at: now,
                compiler_version: options.compiler_version.clone(),
                sources: SourceDocuments {
                    org_baseline: DocumentRef {
                        id: base.baseline_id.clone(),
                        version: base.version,
                    },
                    app_spec: DocumentRef {
                        id: app.spec_id.clone(),
                        version: app.version,
                    },
                    environment_profile: DocumentRef {
                        id: env.profile_id.clone(),
                        version: env.version,
                    },
                },
                integrity: IntegrityRecord::default(),
            },
            project_identity: ProjectIdentity {
                project_id: input.project_id.to_string(),
                environment: env.environment.clone(),
                delivery_stage: env.delivery_stage,
                risk_level: env.risk_level,
                approval_level: env.approval_level,
                ai_enabled,
            },
            autonomy_policy: Self::autonomy_policy(env),
            required_tests: Self::required_tests(base, &flags, rai_requirements.as_ref()),
            evidence_requirements: Self::evidence_requirements(
                &flags,
                env.delivery_stage,
                rai_requirements.as_ref(),
            ),
            security_requirements,
            network_requirements: NetworkRequirements {
                deny_by_default: flags.deny_egress_by_default,
                require_tls: flags.require_tls,
                outbound_allowlist: flags.outbound_allowlist.clone(),
            },
            data_requirements: DataRequirements {
                forbid_pii_in_logs: flags.forbid_pii_in_logs,
                encryption_at_rest: flags.encryption_at_rest,
                retention_days: flags.retention_days,
                classifications: app.data_classifications.clone(),
            },
            rai_requirements,
            approval_checkpoints: approval_checkpoints(env.approval_level, ai_enabled),
            change_reassessment_triggers: Self::reassessment_triggers(ai_enabled),
            remediation_eligibility: Self::remediation_eligibility(env),
            effective_controls: controls,
            exceptions,
        };
        package.seal()?;

        tracing::debug!(
            project_id = %input.project_id,
            revision = input.revision,
            environment = %env.environment,
            "compiled context package"
        );
        Ok(package)
    }

    /// Org controls with app then environment overrides applied.
    fn effective_controls(
        base: &OrgBaseline,
        app: &ApplicationSpec,
        env: &EnvironmentProfile,
    ) -> Result<ControlDomains, CompileError> {
        let mut controls = base.controls.clone();
        for overrides in [&app.control_overrides, &env.control_overrides] {
            apply_control_overrides(&mut controls, overrides)?;
        }
        Ok(controls)
    }

    fn autonomy_policy(env: &EnvironmentProfile) -> AutonomyPolicy {
        let blocked = dedup(env.blocked_capabilities.iter().cloned());
        let approval_required_for = dedup(
            ALWAYS_APPROVE
                .iter()
                .map(|a| a.to_string())
                .chain(env.approval_required.iter().cloned())
                .filter(|a| !blocked.contains(a)),
        );
        let allowed = dedup(
            env.allowed_capabilities
                .iter()
                .filter(|a| !blocked.contains(a) && !approval_required_for.contains(a))
                .cloned(),
        );
        AutonomyPolicy {
            mode: env.autonomy_mode,
            allowed_actions: allowed,
            blocked_actions: blocked,
            approval_required_for,
        }
    }

    fn rai_requirements(
        app: &ApplicationSpec,
        env: &EnvironmentProfile,
        controls: &ControlDomains,
    ) -> RaiRequirements {
        let oversight_control = ControlPath::parse("safety.human_oversight")
            .map(|p| controls.get(&p))
            .unwrap_or_default();
        let high_risk = env.risk_level >= RiskLevel::High;

        let mut required_reviews = vec!["rai_review".to_string()];
        if high_risk {
            required_reviews.push("model_risk_review".to_string());
        }

        RaiRequirements {
            human_oversight: oversight_control.is_enabled()
                || high_risk
                || env.autonomy_mode != AutonomyMode::Autonomous,
            fairness_assessment_required: env.risk_level >= RiskLevel::Medium,
            prohibited_in_model_context: app.prohibited_in_model_context.clone(),
            required_reviews,
        }
    }

    fn required_tests(
        base: &OrgBaseline,
        flags: &MergedFlags,
        rai: Option<&RaiRequirements>,
    ) -> RequiredTests {
        let mut security = base.testing.security.clone();
        if flags.forbid_hardcoded_secrets {
            security.push("secret_scan".to_string());
        }
        if flags.require_sast {
            security.push("sast".to_string());
        }
        if flags.require_dependency_scan {
            security.push("dependency_scan".to_string());
        }

        let mut rai_tests = Vec::new();
        if let Some(rai) = rai {
            rai_tests.extend(base.testing.rai.iter().cloned());
            rai_tests.push("prompt_injection".to_string());
            rai_tests.push("data_leakage".to_string());
            if rai.fairness_assessment_required {
                rai_tests.push("fairness_evaluation".to_string());
            }
        }

        RequiredTests {
            security: dedup(security),
            rai: dedup(rai_tests),
            functional: dedup(base.testing.functional.iter().cloned()),
        }
    }

    fn evidence_requirements(
        flags: &MergedFlags,
        stage: DeliveryStage,
        rai: Option<&RaiRequirements>,
    ) -> Vec<String> {
        let mut evidence = Vec::new();
        if flags.require_code_review {
            evidence.push("code_review_record".to_string());
        }
        if flags.require_sast {
            evidence.push("sast_report".to_string());
        }
        if flags.require_dependency_scan {
            evidence.push("dependency_scan_report".to_string());
        }
        if matches!(stage, DeliveryStage::Staging | DeliveryStage::Production) {
            evidence.push("sbom".to_string());
        }
        if let Some(rai) = rai {
            evidence.push("rai_review".to_string());
            if rai.fairness_assessment_required {
                evidence.push("fairness_evidence".to_string());
            }
        }
        evidence
    }

    fn reassessment_triggers(ai_enabled: bool) -> Vec<String> {
        let mut triggers: Vec<String> = REASSESSMENT_TRIGGERS.iter().map(|t| t.to_string()).collect();
        if ai_enabled {
            triggers.extend(AI_REASSESSMENT_TRIGGERS.iter().map(|t| t.to_string()));
        }
        triggers
    }

    fn remediation_eligibility(env: &EnvironmentProfile) -> RemediationEligibility {
        RemediationEligibility {
            auto_remediation_allowed: env.autonomy_mode != AutonomyMode::Assist
                && env.risk_level < RiskLevel::Critical,
            human_review_required: env.approval_level >= ApprovalLevel::High
                || env.autonomy_mode != AutonomyMode::Autonomous,
            excluded_rule_types: HUMAN_ONLY_RULE_TYPES.iter().map(|r| r.to_string()).collect(),
        }
    }
}

fn apply_control_overrides(
    controls: &mut ControlDomains,
    overrides: &BTreeMap<String, bool>,
) -> Result<(), CompileError> {
    for (path, value) in overrides {
        let path = ControlPath::parse(path)?;
        controls.set(&path, Control::from(*value));
    }
    Ok(())
}

/// Remove duplicates, keeping first occurrence order.
fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
