// evaluators/mod.rs - Rule evaluators, one per RuleKind.
//
// Each evaluator is a pure function of (params, context). Dispatch is an
// exhaustive match, so adding a RuleKind without an evaluator does not
// compile. Evaluators return `Err` only for broken inputs (bad params,
// unavailable collaborator data); the gate evaluator turns those into
// `fail` results.

mod ai_security;
mod approvals;
mod compliance;
mod documents;
mod evidence;
mod fairness;
mod findings;
mod governance;

use keel_model::{RuleKind, RuleStatus};
use serde_json::Value;
use thiserror::Error;

use crate::context::EvaluationContext;

/// What one evaluator concluded.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub status: RuleStatus,
    pub message: String,
    pub details: Value,
}

impl RuleOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            status: RuleStatus::Pass,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: RuleStatus::Fail,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn skip(message: impl Into<String>) -> Self {
        Self {
            status: RuleStatus::Skip,
            message: message.into(),
            details: Value::Null,
        }
    }

    /// Pass or fail on a condition.
    pub fn check(ok: bool, pass: impl Into<String>, fail: impl Into<String>) -> Self {
        if ok {
            Self::pass(pass)
        } else {
            Self::fail(fail)
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// An evaluator could not reach a verdict.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct RuleError(pub String);

impl From<keel_model::ModelError> for RuleError {
    fn from(e: keel_model::ModelError) -> Self {
        RuleError(e.to_string())
    }
}

/// Evaluate one rule kind against a context.
pub fn evaluate(kind: &RuleKind, ctx: &EvaluationContext) -> Result<RuleOutcome, RuleError> {
    use RuleKind::*;
    match kind {
        OrgBaselinePresent => Ok(documents::org_baseline_present(ctx)),
        AppSpecPresent => Ok(documents::app_spec_present(ctx)),
        EnvironmentProfilePresent => Ok(documents::environment_profile_present(ctx)),
        CompiledPackagePresent => Ok(documents::compiled_package_present(ctx)),
        ReportPresent { report_type } => Ok(documents::report_present(ctx, report_type)),

        NoSecretsDetected => Ok(findings::no_secrets_detected(ctx)),
        MaxCriticalFindings { max } => Ok(findings::max_severity(ctx, keel_model::Severity::Critical, *max)),
        MaxHighFindings { max } => Ok(findings::max_severity(ctx, keel_model::Severity::High, *max)),
        MaxOpenFindings { max } => Ok(findings::max_open(ctx, *max)),
        NoFindingsInCategory { category } => Ok(findings::no_findings_in_category(ctx, category)),
        MaxFindingsByTool { tool_name, max } => Ok(findings::max_by_tool(ctx, tool_name, *max)),
        MaxCvssScore { threshold } => findings::max_cvss(ctx, *threshold),
        NoDependencyVulnerabilities => Ok(findings::no_dependency_vulnerabilities(ctx)),
        NoIacMisconfigurations => Ok(findings::no_iac_misconfigurations(ctx)),

        TestReportPresent { test_type } => Ok(evidence::test_report_present(ctx, test_type)),
        SbomPresent => Ok(evidence::sbom_present(ctx)),
        ScanTargetsRegistered { min } => Ok(evidence::scan_targets_registered(ctx, *min)),
        ScanTargetsPassing => Ok(evidence::scan_targets_passing(ctx)),
        ScanCoverage { tool_type } => Ok(evidence::scan_coverage(ctx, tool_type)),

        ApprovalPresent { request_type } => Ok(approvals::approval_present(ctx, request_type)),
        NoPendingApprovals { request_type } => {
            Ok(approvals::no_pending(ctx, request_type.as_deref()))
        }
        SecurityReviewApproved => Ok(approvals::approval_present(ctx, approvals::SECURITY_REVIEW)),
        RaiReviewApproved => Ok(approvals::approval_present(ctx, approvals::RAI_REVIEW)),

        NoPromptInjectionFindings => Ok(ai_security::no_prompt_injection(ctx)),
        NoAiSecurityFindings => Ok(ai_security::no_ai_security_findings(ctx)),
        NoDataLeakageFindings => Ok(ai_security::no_data_leakage(ctx)),
        ModelContextRestricted => Ok(ai_security::model_context_restricted(ctx)),

        FairnessCasePresent => Ok(fairness::case_present(ctx)),
        FairnessRequirementsDefined => Ok(fairness::requirements_defined(ctx)),
        FairnessEvidenceAttested => Ok(fairness::evidence_attested(ctx)),
        FairnessEvidenceFresh { max_age_days } => fairness::evidence_fresh(ctx, *max_age_days),
        FairnessMonitoringActive => Ok(fairness::monitoring_active(ctx)),
        NoFairnessSignalBreaches => Ok(fairness::no_signal_breaches(ctx)),
        ContextReceiptsPresent => Ok(fairness::context_receipts_present(ctx)),

        MinComplianceScore { min_score } => compliance::min_score(ctx, *min_score),
        FrameworkScore { framework, min_score } => compliance::framework_score(ctx, framework, *min_score),
        FrameworkRequirementsMet => Ok(compliance::requirements_met(ctx)),
        FrameworkControlRequired { category, control } | Aiuc1ControlRequired { category, control } => {
            compliance::control_required(ctx, category, control)
        }
        BaselineDomainAssessed { category } => compliance::domain_assessed(ctx, category),

        MaxActiveExceptions { max } => Ok(governance::max_active_exceptions(ctx, *max)),
        ExceptionsHaveCompensatingControls => Ok(governance::compensating_controls(ctx)),
        MaxRiskLevel { max } => Ok(governance::max_risk_level(ctx, *max)),
        AutonomyModeAllowed { modes } => Ok(governance::autonomy_mode_allowed(ctx, modes)),

        Unknown => Ok(RuleOutcome::skip("unknown rule type; skipped")),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use keel_model::{Project, Transition};

    use crate::context::EvaluationContext;

    pub(crate) fn context() -> EvaluationContext {
        EvaluationContext::empty(
            Project {
                project_id: "payments-api".to_string(),
                name: "Payments API".to_string(),
                org_id: Some("acme".to_string()),
                business_unit_id: None,
                ai_enabled: false,
                current_environment: "dev".to_string(),
            },
            Transition::new("dev", "preprod"),
        )
    }
}
