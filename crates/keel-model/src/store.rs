// store.rs - Collaborator traits at the persistence boundary.
//
// The core never talks to a database directly. Documents, evidence and
// persisted results flow through these traits; storage backends implement
// them. All methods are synchronous and take `&self`, so one backend can
// be shared behind an `Arc` by the compiler, the gate evaluator and any
// number of concurrent evaluations.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::app_spec::ApplicationSpec;
use crate::baseline::OrgBaseline;
use crate::environment::EnvironmentProfile;
use crate::error::StoreError;
use crate::evaluation::PromotionEvaluation;
use crate::evidence::{
    ApprovalRequest, ApprovalStatus, ComplianceAssessment, ComplianceFindingInput, ContextReceipt,
    EvidencePackage, FairnessCase, FairnessRequirements, Finding, MonitoringSignal, ReportRecord, ScanTarget,
};
use crate::exception::Exception;
use crate::framework::{BusinessUnit, FrameworkRequirement, Project};
use crate::package::CompiledContextPackage;
use crate::task::TaskPacket;

/// The three active policy documents for a project.
pub trait DocumentStore: Send + Sync {
    fn get_org_baseline(&self, project_id: &str) -> Result<Option<OrgBaseline>, StoreError>;
    fn get_app_spec(&self, project_id: &str) -> Result<Option<ApplicationSpec>, StoreError>;
    fn get_environment_profile(
        &self,
        project_id: &str,
    ) -> Result<Option<EnvironmentProfile>, StoreError>;
}

pub trait ProjectStore: Send + Sync {
    fn get_project(&self, project_id: &str) -> Result<Option<Project>, StoreError>;

    /// Record that the project now runs in `environment`.
    fn record_environment(&self, project_id: &str, environment: &str) -> Result<(), StoreError>;
}

pub trait FrameworkStore: Send + Sync {
    fn get_business_unit(&self, business_unit_id: &str) -> Result<Option<BusinessUnit>, StoreError>;

    /// Every requirement of the given frameworks, unfiltered.
    fn requirements_for_frameworks(
        &self,
        framework_ids: &[String],
    ) -> Result<Vec<FrameworkRequirement>, StoreError>;
}

pub trait ExceptionStore: Send + Sync {
    /// Exceptions with status `active` whose expiry is after `now`.
    fn active_exceptions(
        &self,
        project_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Exception>, StoreError>;
}

/// Compiled packages, keyed by project and revision. Packages are never
/// updated in place; "latest" is the highest revision.
pub trait PackageStore: Send + Sync {
    /// Store a package. Fails with `Conflict` if the revision already exists.
    fn upsert_package(&self, package: &CompiledContextPackage) -> Result<(), StoreError>;

    fn latest_package(&self, project_id: &str) -> Result<Option<CompiledContextPackage>, StoreError>;

    /// Highest stored revision, or 0 when the project has no package.
    fn latest_revision(&self, project_id: &str) -> Result<u64, StoreError>;
}

pub trait FindingStore: Send + Sync {
    fn open_findings(&self, project_id: &str) -> Result<Vec<Finding>, StoreError>;
}

pub trait ApprovalStore: Send + Sync {
    fn approvals(&self, project_id: &str) -> Result<Vec<ApprovalRequest>, StoreError>;
    fn create_approval_request(&self, request: &ApprovalRequest) -> Result<(), StoreError>;

    /// Change a request's status. Fails with `NotFound` if it does not exist.
    fn set_approval_status(&self, request_id: &str, status: ApprovalStatus) -> Result<(), StoreError>;
}

/// Reports, scan targets and fairness records.
pub trait EvidenceStore: Send + Sync {
    fn reports(&self, project_id: &str) -> Result<Vec<ReportRecord>, StoreError>;
    fn scan_targets(&self, project_id: &str) -> Result<Vec<ScanTarget>, StoreError>;
    fn fairness_case(&self, project_id: &str) -> Result<Option<FairnessCase>, StoreError>;
    fn fairness_requirements(
        &self,
        project_id: &str,
    ) -> Result<Option<FairnessRequirements>, StoreError>;
    fn evidence_packages(&self, project_id: &str) -> Result<Vec<EvidencePackage>, StoreError>;
    fn monitoring_signals(&self, project_id: &str) -> Result<Vec<MonitoringSignal>, StoreError>;
    fn context_receipts(&self, project_id: &str) -> Result<Vec<ContextReceipt>, StoreError>;
}

/// The compliance-assessment subsystem, consumed read-only.
pub trait ComplianceAssessor: Send + Sync {
    fn assess(&self, findings: &[ComplianceFindingInput]) -> Result<ComplianceAssessment, StoreError>;
}

pub trait EvaluationStore: Send + Sync {
    fn save_evaluation(&self, evaluation: &PromotionEvaluation) -> Result<(), StoreError>;

    /// Persisted evaluations for a project, newest first.
    fn evaluation_history(&self, project_id: &str) -> Result<Vec<PromotionEvaluation>, StoreError>;
}

/// Outcome of [`TaskPacketStore::create_if_absent`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskCreation {
    /// No open packet existed; this one was stored.
    Created(TaskPacket),
    /// An open packet for the same (project, rule) already existed.
    Existing(TaskPacket),
}

impl TaskCreation {
    pub fn packet(&self) -> &TaskPacket {
        match self {
            TaskCreation::Created(p) | TaskCreation::Existing(p) => p,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, TaskCreation::Created(_))
    }
}

pub trait TaskPacketStore: Send + Sync {
    /// Store `packet` unless an open packet with the same project and rule
    /// already exists. The check and the insert must be one atomic step in
    /// the backend (a transaction or a unique constraint), so concurrent
    /// evaluations cannot both create.
    fn create_if_absent(&self, packet: TaskPacket) -> Result<TaskCreation, StoreError>;

    fn open_packet(&self, project_id: &str, rule_id: &str) -> Result<Option<TaskPacket>, StoreError>;

    fn get_packet(&self, packet_id: Uuid) -> Result<Option<TaskPacket>, StoreError>;

    /// Replace a stored packet. Fails with `NotFound` if it does not exist.
    fn update_packet(&self, packet: &TaskPacket) -> Result<(), StoreError>;

    fn packets_for_project(&self, project_id: &str) -> Result<Vec<TaskPacket>, StoreError>;
}

/// Everything gate evaluation reads and writes, as one object.
///
/// Blanket-implemented for any type that implements every collaborator
/// trait, so a single backend can be passed as `Arc<dyn GovernanceStore>`.
pub trait GovernanceStore:
    DocumentStore
    + ProjectStore
    + FrameworkStore
    + ExceptionStore
    + PackageStore
    + FindingStore
    + ApprovalStore
    + EvidenceStore
    + EvaluationStore
    + TaskPacketStore
{
}

impl<T> GovernanceStore for T where
    T: DocumentStore
        + ProjectStore
        + FrameworkStore
        + ExceptionStore
        + PackageStore
        + FindingStore
        + ApprovalStore
        + EvidenceStore
        + EvaluationStore
        + TaskPacketStore
{
}
