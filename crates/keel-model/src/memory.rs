// memory.rs - In-memory implementation of every collaborator trait.
//
// Used by tests and by embedders that assemble policy in-process. All state
// sits behind one mutex, which makes `create_if_absent` a true
// check-then-insert: two evaluations racing on the same (project, rule)
// see a single open packet.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::app_spec::ApplicationSpec;
use crate::baseline::OrgBaseline;
use crate::environment::EnvironmentProfile;
use crate::error::StoreError;
use crate::evaluation::PromotionEvaluation;
use crate::evidence::{
    ApprovalRequest, ApprovalStatus, ComplianceAssessment, ComplianceFindingInput, ContextReceipt,
    EvidencePackage, FairnessCase, FairnessRequirements, Finding, FindingStatus, MonitoringSignal, ReportRecord,
    ScanTarget, Severity,
};
use crate::exception::Exception;
use crate::framework::{BusinessUnit, FrameworkRequirement, Project};
use crate::package::CompiledContextPackage;
use crate::store::{
    ApprovalStore, ComplianceAssessor, DocumentStore, EvaluationStore, EvidenceStore,
    ExceptionStore, FindingStore, FrameworkStore, PackageStore, ProjectStore, TaskCreation,
    TaskPacketStore,
};
use crate::task::TaskPacket;

#[derive(Debug, Default)]
struct MemoryState {
    projects: BTreeMap<String, Project>,
    baselines: BTreeMap<String, OrgBaseline>,
    app_specs: BTreeMap<String, ApplicationSpec>,
    profiles: BTreeMap<String, EnvironmentProfile>,
    business_units: BTreeMap<String, BusinessUnit>,
    requirements: Vec<FrameworkRequirement>,
    exceptions: Vec<Exception>,
    packages: Vec<CompiledContextPackage>,
    findings: Vec<Finding>,
    approvals: Vec<ApprovalRequest>,
    reports: Vec<ReportRecord>,
    scan_targets: Vec<ScanTarget>,
    fairness_cases: BTreeMap<String, FairnessCase>,
    fairness_requirements: BTreeMap<String, FairnessRequirements>,
    evidence: Vec<EvidencePackage>,
    signals: Vec<MonitoringSignal>,
    receipts: Vec<ContextReceipt>,
    evaluations: Vec<PromotionEvaluation>,
    packets: Vec<TaskPacket>,
    assessment: Option<ComplianceAssessment>,
}

/// Thread-safe in-memory store.
///
/// ```rust,ignore
/// let store = MemoryStore::new()
///     .with_project(project)
///     .with_org_baseline("payments-api", baseline)
///     .with_finding(finding);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn state_mut(&mut self) -> &mut MemoryState {
        match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // -- builders --

    pub fn with_project(mut self, project: Project) -> Self {
        self.state_mut()
            .projects
            .insert(project.project_id.clone(), project);
        self
    }

    pub fn with_org_baseline(mut self, project_id: &str, baseline: OrgBaseline) -> Self {
        self.state_mut()
            .baselines
            .insert(project_id.to_string(), baseline);
        self
    }

    pub fn with_app_spec(mut self, spec: ApplicationSpec) -> Self {
        self.state_mut()
            .app_specs
            .insert(spec.project_id.clone(), spec);
        self
    }

    pub fn with_environment_profile(mut self, profile: EnvironmentProfile) -> Self {
        self.state_mut()
            .profiles
            .insert(profile.project_id.clone(), profile);
        self
    }

    pub fn with_business_unit(mut self, unit: BusinessUnit) -> Self {
        self.state_mut()
            .business_units
            .insert(unit.business_unit_id.clone(), unit);
        self
    }

    pub fn with_requirement(mut self, requirement: FrameworkRequirement) -> Self {
        self.state_mut().requirements.push(requirement);
        self
    }

    pub fn with_exception(mut self, exception: Exception) -> Self {
        self.state_mut().exceptions.push(exception);
        self
    }

    pub fn with_finding(mut self, finding: Finding) -> Self {
        self.state_mut().findings.push(finding);
        self
    }

    pub fn with_approval(mut self, approval: ApprovalRequest) -> Self {
        self.state_mut().approvals.push(approval);
        self
    }

    pub fn with_report(mut self, report: ReportRecord) -> Self {
        self.state_mut().reports.push(report);
        self
    }

    pub fn with_scan_target(mut self, target: ScanTarget) -> Self {
        self.state_mut().scan_targets.push(target);
        self
    }

    pub fn with_fairness_case(mut self, case: FairnessCase) -> Self {
        self.state_mut()
            .fairness_cases
            .insert(case.project_id.clone(), case);
        self
    }

    pub fn with_fairness_requirements(
        mut self,
        project_id: &str,
        requirements: FairnessRequirements,
    ) -> Self {
        self.state_mut()
            .fairness_requirements
            .insert(project_id.to_string(), requirements);
        self
    }

    pub fn with_evidence_package(mut self, evidence: EvidencePackage) -> Self {
        self.state_mut().evidence.push(evidence);
        self
    }

    pub fn with_monitoring_signal(mut self, signal: MonitoringSignal) -> Self {
        self.state_mut().signals.push(signal);
        self
    }

    pub fn with_context_receipt(mut self, receipt: ContextReceipt) -> Self {
        self.state_mut().receipts.push(receipt);
        self
    }

    /// Return this assessment instead of the severity-weighted default.
    pub fn with_assessment(mut self, assessment: ComplianceAssessment) -> Self {
        self.state_mut().assessment = Some(assessment);
        self
    }

    // -- mutation after construction --

    pub fn add_finding(&self, finding: Finding) -> Result<(), StoreError> {
        self.lock()?.findings.push(finding);
        Ok(())
    }

    pub fn resolve_finding(&self, finding_id: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let finding = state
            .findings
            .iter_mut()
            .find(|f| f.finding_id == finding_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "finding".to_string(),
                id: finding_id.to_string(),
            })?;
        finding.status = FindingStatus::Resolved;
        Ok(())
    }

    pub fn add_report(&self, report: ReportRecord) -> Result<(), StoreError> {
        self.lock()?.reports.push(report);
        Ok(())
    }

    pub fn add_approval(&self, approval: ApprovalRequest) -> Result<(), StoreError> {
        self.lock()?.approvals.push(approval);
        Ok(())
    }

    pub fn put_environment_profile(&self, profile: EnvironmentProfile) -> Result<(), StoreError> {
        self.lock()?
            .profiles
            .insert(profile.project_id.clone(), profile);
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn get_org_baseline(&self, project_id: &str) -> Result<Option<OrgBaseline>, StoreError> {
        Ok(self.lock()?.baselines.get(project_id).cloned())
    }

    fn get_app_spec(&self, project_id: &str) -> Result<Option<ApplicationSpec>, StoreError> {
        Ok(self.lock()?.app_specs.get(project_id).cloned())
    }

    fn get_environment_profile(
        &self,
        project_id: &str,
    ) -> Result<Option<EnvironmentProfile>, StoreError> {
        Ok(self.lock()?.profiles.get(project_id).cloned())
    }
}

impl ProjectStore for MemoryStore {
    fn get_project(&self, project_id: &str) -> Result<Option<Project>, StoreError> {
        Ok(self.lock()?.projects.get(project_id).cloned())
    }

    fn record_environment(&self, project_id: &str, environment: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let project = state
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "project".to_string(),
                id: project_id.to_string(),
            })?;
        project.current_environment = environment.to_string();
        Ok(())
    }
}

impl FrameworkStore for MemoryStore {
    fn get_business_unit(&self, business_unit_id: &str) -> Result<Option<BusinessUnit>, StoreError> {
        Ok(self.lock()?.business_units.get(business_unit_id).cloned())
    }

    fn requirements_for_frameworks(
        &self,
        framework_ids: &[String],
    ) -> Result<Vec<FrameworkRequirement>, StoreError> {
        Ok(self
            .lock()?
            .requirements
            .iter()
            .filter(|r| framework_ids.contains(&r.framework_id))
            .cloned()
            .collect())
    }
}

impl ExceptionStore for MemoryStore {
    fn active_exceptions(
        &self,
        project_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Exception>, StoreError> {
        Ok(self
            .lock()?
            .exceptions
            .iter()
            .filter(|e| e.project_id == project_id && e.is_active_at(now))
            .cloned()
            .collect())
    }
}

impl PackageStore for MemoryStore {
    fn upsert_package(&self, package: &CompiledContextPackage) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let duplicate = state.packages.iter().any(|p| {
            p.project_id() == package.project_id() && p.revision() == package.revision()
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "package revision {} already exists for project {}",
                package.revision(),
                package.project_id()
            )));
        }
        state.packages.push(package.clone());
        Ok(())
    }

    fn latest_package(&self, project_id: &str) -> Result<Option<CompiledContextPackage>, StoreError> {
        Ok(self
            .lock()?
            .packages
            .iter()
            .filter(|p| p.project_id() == project_id)
            .max_by_key(|p| p.revision())
            .cloned())
    }

    fn latest_revision(&self, project_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .lock()?
            .packages
            .iter()
            .filter(|p| p.project_id() == project_id)
            .map(|p| p.revision())
            .max()
            .unwrap_or(0))
    }
}

impl FindingStore for MemoryStore {
    fn open_findings(&self, project_id: &str) -> Result<Vec<Finding>, StoreError> {
        Ok(self
            .lock()?
            .findings
            .iter()
            .filter(|f| f.project_id == project_id && f.is_open())
            .cloned()
            .collect())
    }
}

impl ApprovalStore for MemoryStore {
    fn approvals(&self, project_id: &str) -> Result<Vec<ApprovalRequest>, StoreError> {
        Ok(self
            .lock()?
            .approvals
            .iter()
            .filter(|a| a.project_id == project_id)
            .cloned()
            .collect())
    }

    fn create_approval_request(&self, request: &ApprovalRequest) -> Result<(), StoreError> {
        self.lock()?.approvals.push(request.clone());
        Ok(())
    }

    fn set_approval_status(&self, request_id: &str, status: ApprovalStatus) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let request = state
            .approvals
            .iter_mut()
            .find(|a| a.request_id == request_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "approval request".to_string(),
                id: request_id.to_string(),
            })?;
        request.status = status;
        Ok(())
    }
}

fn for_project<T: Clone>(items: &[T], project_id: &str, key: impl Fn(&T) -> &str) -> Vec<T> {
    items
        .iter()
        .filter(|item| key(item) == project_id)
        .cloned()
        .collect()
}

impl EvidenceStore for MemoryStore {
    fn reports(&self, project_id: &str) -> Result<Vec<ReportRecord>, StoreError> {
        Ok(for_project(&self.lock()?.reports, project_id, |r| r.project_id.as_str()))
    }

    fn scan_targets(&self, project_id: &str) -> Result<Vec<ScanTarget>, StoreError> {
        Ok(for_project(&self.lock()?.scan_targets, project_id, |t| t.project_id.as_str()))
    }

    fn fairness_case(&self, project_id: &str) -> Result<Option<FairnessCase>, StoreError> {
        Ok(self.lock()?.fairness_cases.get(project_id).cloned())
    }

    fn fairness_requirements(
        &self,
        project_id: &str,
    ) -> Result<Option<FairnessRequirements>, StoreError> {
        Ok(self.lock()?.fairness_requirements.get(project_id).cloned())
    }

    fn evidence_packages(&self, project_id: &str) -> Result<Vec<EvidencePackage>, StoreError> {
        Ok(for_project(&self.lock()?.evidence, project_id, |e| e.project_id.as_str()))
    }

    fn monitoring_signals(&self, project_id: &str) -> Result<Vec<MonitoringSignal>, StoreError> {
        Ok(for_project(&self.lock()?.signals, project_id, |s| s.project_id.as_str()))
    }

    fn context_receipts(&self, project_id: &str) -> Result<Vec<ContextReceipt>, StoreError> {
        Ok(for_project(&self.lock()?.receipts, project_id, |r| r.project_id.as_str()))
    }
}

fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 25.0,
        Severity::High => 10.0,
        Severity::Medium => 5.0,
        Severity::Low => 2.0,
        Severity::Info => 0.0,
    }
}

impl ComplianceAssessor for MemoryStore {
    /// Severity-weighted score unless a fixed assessment was configured.
    fn assess(&self, findings: &[ComplianceFindingInput]) -> Result<ComplianceAssessment, StoreError> {
        if let Some(fixed) = &self.lock()?.assessment {
            return Ok(fixed.clone());
        }
        let penalty: f64 = findings.iter().map(|f| severity_weight(f.severity)).sum();
        Ok(ComplianceAssessment {
            overall_score: (100.0 - penalty).max(0.0),
            frameworks: BTreeMap::new(),
        })
    }
}

impl EvaluationStore for MemoryStore {
    fn save_evaluation(&self, evaluation: &PromotionEvaluation) -> Result<(), StoreError> {
        self.lock()?.evaluations.push(evaluation.clone());
        Ok(())
    }

    fn evaluation_history(&self, project_id: &str) -> Result<Vec<PromotionEvaluation>, StoreError> {
        let mut history = for_project(&self.lock()?.evaluations, project_id, |e| e.project_id.as_str());
        // Stable sort keeps insertion order for equal timestamps; reverse
        // afterwards so the most recently saved comes first.
        history.sort_by_key(|e| e.evaluated_at);
        history.reverse();
        Ok(history)
    }
}

impl TaskPacketStore for MemoryStore {
    fn create_if_absent(&self, packet: TaskPacket) -> Result<TaskCreation, StoreError> {
        let mut state = self.lock()?;
        let existing = state.packets.iter().find(|p| {
            p.is_open() && p.project_id == packet.project_id && p.rule_id == packet.rule_id
        });
        if let Some(existing) = existing {
            return Ok(TaskCreation::Existing(existing.clone()));
        }
        state.packets.push(packet.clone());
        Ok(TaskCreation::Created(packet))
    }

    fn open_packet(&self, project_id: &str, rule_id: &str) -> Result<Option<TaskPacket>, StoreError> {
        Ok(self
            .lock()?
            .packets
            .iter()
            .find(|p| p.is_open() && p.project_id == project_id && p.rule_id == rule_id)
            .cloned())
    }

    fn get_packet(&self, packet_id: Uuid) -> Result<Option<TaskPacket>, StoreError> {
        Ok(self
            .lock()?
            .packets
            .iter()
            .find(|p| p.packet_id == packet_id)
            .cloned())
    }

    fn update_packet(&self, packet: &TaskPacket) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let slot = state
            .packets
            .iter_mut()
            .find(|p| p.packet_id == packet.packet_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "task packet".to_string(),
                id: packet.packet_id.to_string(),
            })?;
        *slot = packet.clone();
        Ok(())
    }

    fn packets_for_project(&self, project_id: &str) -> Result<Vec<TaskPacket>, StoreError> {
        Ok(for_project(&self.lock()?.packets, project_id, |p| p.project_id.as_str()))
    }
}
