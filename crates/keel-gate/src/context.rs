// context.rs - The read-only snapshot a gate is evaluated against.
//
// ContextAssembler performs every store read for one evaluation up front.
// Once an EvaluationContext exists, rule evaluation is a pure function of
// (rule, context): no evaluator calls back into storage and no lock is
// held while rules run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use keel_model::{
    ApplicationSpec, ApprovalRequest, ApprovalStatus, ApprovalStore, ComplianceAssessment,
    ComplianceAssessor, ComplianceFindingInput, CompiledContextPackage, ContextReceipt,
    ControlDomains, DocumentStore, EnvironmentProfile, EvidencePackage, EvidenceStore, Exception,
    ExceptionStore, FairnessCase, FairnessRequirements, Finding, FindingStore, FrameworkRequirement,
    GovernanceStore, MonitoringSignal, OrgBaseline, PackageStore, Project, ProjectStore,
    ReportRecord, ScanTarget, Severity, Transition,
};

use crate::error::GateError;
use crate::resolver::RequirementResolver;

/// Open findings, grouped the ways rules query them.
#[derive(Debug, Clone, Default)]
pub struct FindingSummary {
    pub open: Vec<Finding>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_tool_name: BTreeMap<String, usize>,
    pub by_tool_type: BTreeMap<String, usize>,
}

impl FindingSummary {
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let mut summary = Self::default();
        for finding in &findings {
            *summary.by_severity.entry(finding.severity).or_default() += 1;
            *summary
                .by_category
                .entry(finding.category.to_ascii_lowercase())
                .or_default() += 1;
            *summary
                .by_tool_name
                .entry(finding.source.tool_name.clone())
                .or_default() += 1;
            *summary
                .by_tool_type
                .entry(finding.source.tool_type.to_ascii_lowercase())
                .or_default() += 1;
        }
        summary.open = findings;
        summary
    }

    pub fn total(&self) -> usize {
        self.open.len()
    }

    pub fn severity(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    pub fn category(&self, category: &str) -> usize {
        self.by_category
            .get(&category.to_ascii_lowercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn tool_name(&self, tool_name: &str) -> usize {
        self.by_tool_name.get(tool_name).copied().unwrap_or(0)
    }

    pub fn tool_type(&self, tool_type: &str) -> usize {
        self.by_tool_type
            .get(&tool_type.to_ascii_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Findings matching a predicate, by id.
    pub fn ids_where(&self, predicate: impl Fn(&Finding) -> bool) -> Vec<String> {
        self.open
            .iter()
            .filter(|f| predicate(f))
            .map(|f| f.finding_id.clone())
            .collect()
    }
}

/// Approval requests counted by type and status.
#[derive(Debug, Clone, Default)]
pub struct ApprovalSummary {
    pub approved: BTreeMap<String, usize>,
    pub pending: BTreeMap<String, usize>,
}

impl ApprovalSummary {
    pub fn from_requests(requests: &[ApprovalRequest]) -> Self {
        let mut summary = Self::default();
        for request in requests {
            let bucket = match request.status {
                ApprovalStatus::Approved | ApprovalStatus::Consumed => &mut summary.approved,
                ApprovalStatus::Pending => &mut summary.pending,
                ApprovalStatus::Rejected => continue,
            };
            *bucket.entry(request.request_type.clone()).or_default() += 1;
        }
        summary
    }

    pub fn has_approved(&self, request_type: &str) -> bool {
        self.approved.get(request_type).is_some_and(|n| *n > 0)
    }

    /// Pending requests of one type, or of every type.
    pub fn pending_count(&self, request_type: Option<&str>) -> usize {
        match request_type {
            Some(t) => self.pending.get(t).copied().unwrap_or(0),
            None => self.pending.values().sum(),
        }
    }
}

/// Outcome of the compliance-assessment call.
#[derive(Debug, Clone)]
pub enum ComplianceState {
    /// No scanner findings, so no assessment was requested.
    NotAssessed,
    Assessed(ComplianceAssessment),
    /// The assessor failed. Compliance rules report this as a failure.
    Unavailable(String),
}

#[derive(Debug, Clone, Default)]
pub struct FairnessSnapshot {
    pub case: Option<FairnessCase>,
    pub requirements: Option<FairnessRequirements>,
    pub evidence: Vec<EvidencePackage>,
    pub signals: Vec<MonitoringSignal>,
    pub receipts: Vec<ContextReceipt>,
}

/// Everything the rules of one gate may look at.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub project: Project,
    pub transition: Transition,
    pub evaluated_at: DateTime<Utc>,
    pub ai_enabled: bool,
    pub org_baseline: Option<OrgBaseline>,
    pub app_spec: Option<ApplicationSpec>,
    pub environment_profile: Option<EnvironmentProfile>,
    pub package: Option<CompiledContextPackage>,
    pub findings: FindingSummary,
    pub approvals: ApprovalSummary,
    pub exceptions: Vec<Exception>,
    pub reports: Vec<ReportRecord>,
    pub scan_targets: Vec<ScanTarget>,
    pub fairness: FairnessSnapshot,
    pub requirements: Vec<FrameworkRequirement>,
    pub compliance: ComplianceState,
    /// Default for fairness freshness rules that set no age.
    pub fairness_max_age_days: i64,
}

impl EvaluationContext {
    /// A context with no documents or evidence, for building up in tests
    /// and for callers that assemble snapshots themselves.
    pub fn empty(project: Project, transition: Transition) -> Self {
        Self {
            ai_enabled: project.ai_enabled,
            project,
            transition,
            evaluated_at: Utc::now(),
            org_baseline: None,
            app_spec: None,
            environment_profile: None,
            package: None,
            findings: FindingSummary::default(),
            approvals: ApprovalSummary::default(),
            exceptions: Vec::new(),
            reports: Vec::new(),
            scan_targets: Vec::new(),
            fairness: FairnessSnapshot::default(),
            requirements: Vec::new(),
            compliance: ComplianceState::NotAssessed,
            fairness_max_age_days: 90,
        }
    }

    /// AIUC-1 controls to check rules against: the compiled package's
    /// effective controls when a package exists, else the org baseline's.
    pub fn controls(&self) -> Option<&ControlDomains> {
        self.package
            .as_ref()
            .map(|p| &p.effective_controls)
            .or_else(|| self.org_baseline.as_ref().map(|b| &b.controls))
    }

    /// The active exception that waives a control in the environment the
    /// project is being promoted into. An exception scoped to other
    /// environments waives nothing here.
    pub fn exception_covering(&self, control_id: &str) -> Option<&Exception> {
        let target = &self.transition.target;
        self.exceptions
            .iter()
            .find(|e| e.applies_to_environment(target) && e.covers_control(control_id))
    }

    pub fn has_report(&self, report_type: &str) -> bool {
        self.reports.iter().any(|r| r.report_type == report_type)
    }
}

/// Gathers an [`EvaluationContext`] from the collaborator stores.
pub struct ContextAssembler<'a> {
    store: &'a dyn GovernanceStore,
    assessor: &'a dyn ComplianceAssessor,
    fairness_max_age_days: i64,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(store: &'a dyn GovernanceStore, assessor: &'a dyn ComplianceAssessor) -> Self {
        Self {
            store,
            assessor,
            fairness_max_age_days: 90,
        }
    }

    pub fn with_fairness_max_age_days(mut self, days: i64) -> Self {
        self.fairness_max_age_days = days;
        self
    }

    pub fn assemble(
        &self,
        project_id: &str,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<EvaluationContext, GateError> {
        let store = self.store;
        let project = store
            .get_project(project_id)?
            .ok_or_else(|| GateError::ProjectNotFound {
                project_id: project_id.to_string(),
            })?;

        let org_baseline = store.get_org_baseline(project_id)?;
        let app_spec = store.get_app_spec(project_id)?;
        let environment_profile = store.get_environment_profile(project_id)?;
        let package = store.latest_package(project_id)?;

        let ai_enabled = project.ai_enabled
            || app_spec.as_ref().is_some_and(ApplicationSpec::is_ai_enabled);

        let findings = FindingSummary::from_findings(store.open_findings(project_id)?);
        let compliance = self.assess(&findings);
        let approvals = ApprovalSummary::from_requests(&store.approvals(project_id)?);

        let fairness = FairnessSnapshot {
            case: store.fairness_case(project_id)?,
            requirements: store.fairness_requirements(project_id)?,
            evidence: store.evidence_packages(project_id)?,
            signals: store.monitoring_signals(project_id)?,
            receipts: store.context_receipts(project_id)?,
        };

        let requirements = RequirementResolver::new(store).resolve_for(&project, transition)?;

        Ok(EvaluationContext {
            transition: transition.clone(),
            evaluated_at: now,
            ai_enabled,
            org_baseline,
            app_spec,
            environment_profile,
            package,
            findings,
            approvals,
            exceptions: store.active_exceptions(project_id, now)?,
            reports: store.reports(project_id)?,
            scan_targets: store.scan_targets(project_id)?,
            fairness,
            requirements,
            compliance,
            fairness_max_age_days: self.fairness_max_age_days,
            project,
        })
    }

    fn assess(&self, findings: &FindingSummary) -> ComplianceState {
        if findings.open.is_empty() {
            return ComplianceState::NotAssessed;
        }
        let inputs: Vec<ComplianceFindingInput> =
            findings.open.iter().map(ComplianceFindingInput::from).collect();
        match self.assessor.assess(&inputs) {
            Ok(assessment) => ComplianceState::Assessed(assessment),
            Err(e) => {
                tracing::warn!(error = %e, "compliance assessment unavailable");
                ComplianceState::Unavailable(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_model::{FindingSource, FindingStatus};

    fn finding(id: &str, severity: Severity, category: &str, tool: &str, tool_type: &str) -> Finding {
        Finding {
            finding_id: id.to_string(),
            project_id: "p".to_string(),
            title: id.to_string(),
            severity,
            category: category.to_string(),
            source: FindingSource {
                tool_name: tool.to_string(),
                tool_type: tool_type.to_string(),
            },
            compliance_refs: vec![],
            cvss_score: None,
            status: FindingStatus::Open,
        }
    }

    #[test]
    fn findings_are_grouped() {
        let summary = FindingSummary::from_findings(vec![
            finding("f1", Severity::Critical, "Secrets", "gitleaks", "secrets"),
            finding("f2", Severity::High, "dependency", "trivy", "sca"),
            finding("f3", Severity::High, "dependency", "trivy", "sca"),
        ]);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.severity(Severity::High), 2);
        assert_eq!(summary.severity(Severity::Low), 0);
        assert_eq!(summary.category("secrets"), 1);
        assert_eq!(summary.tool_name("trivy"), 2);
        assert_eq!(summary.tool_type("SCA"), 2);
    }

    #[test]
    fn approvals_are_bucketed_and_rejections_ignored() {
        let request = |t: &str, status| ApprovalRequest {
            request_id: t.to_string(),
            project_id: "p".to_string(),
            request_type: t.to_string(),
            status,
            required_roles: vec![],
            summary: None,
            requested_at: Utc::now(),
        };
        let summary = ApprovalSummary::from_requests(&[
            request("security_review", ApprovalStatus::Approved),
            request("rai_review", ApprovalStatus::Pending),
            request("promotion", ApprovalStatus::Rejected),
        ]);
        assert!(summary.has_approved("security_review"));
        assert!(!summary.has_approved("promotion"));
        assert_eq!(summary.pending_count(None), 1);
        assert_eq!(summary.pending_count(Some("security_review")), 0);
    }
}
