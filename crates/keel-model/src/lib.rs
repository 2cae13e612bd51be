//! # keel-model
//!
//! Typed policy documents and governance records for the Keel policy engine.
//!
//! Three layered documents describe a project's policy:
//!
//! - [`OrgBaseline`]: organization-wide defaults, including the six AIUC-1
//!   control domains whose controls are three-valued ([`Control`]).
//! - [`ApplicationSpec`]: the system's components, trust boundaries and data.
//! - [`EnvironmentProfile`]: the risk posture of one deployment stage.
//!
//! The compiler merges them into a [`CompiledContextPackage`], the single
//! hashed artifact that gate evaluation and local enforcement consume.
//!
//! This crate also defines the gate records ([`PromotionGate`],
//! [`PromotionEvaluation`], [`TaskPacket`]), the evidence records produced
//! by other subsystems, and the collaborator traits in [`store`] through
//! which the core reads and persists them. [`MemoryStore`] implements every
//! collaborator trait in memory.

pub mod app_spec;
pub mod baseline;
pub mod control;
pub mod environment;
pub mod error;
pub mod evaluation;
pub mod evidence;
pub mod exception;
pub mod framework;
pub mod gate;
pub mod memory;
pub mod overrides;
pub mod package;
pub mod store;
pub mod task;

pub use app_spec::{ApplicationSpec, Component, ComponentKind, DataClassification, Sensitivity, TrustBoundary};
pub use baseline::{CodingPolicy, DataPolicy, IamPolicy, NetworkPolicy, OrgBaseline, TestingPolicy};
pub use control::{Control, ControlDomain, ControlDomains, ControlPath};
pub use environment::{ApprovalLevel, AutonomyMode, DeliveryStage, EnvironmentProfile, RiskLevel};
pub use error::{ModelError, StoreError};
pub use evaluation::{EvaluationStatus, PromotionEvaluation, RuleEvaluationResult, RuleStatus};
pub use evidence::{
    ApprovalRequest, ApprovalStatus, AttestationStatus, ComplianceAssessment, ComplianceFindingInput,
    ContextReceipt, EvidencePackage, FairnessCase, FairnessMetric, FairnessRequirements, Finding,
    FindingSource, FindingStatus, MonitoringSignal, ReportRecord, ScanRunStatus, ScanTarget, Severity,
};
pub use exception::{Exception, ExceptionScope, ExceptionStatus};
pub use framework::{BusinessUnit, FrameworkRequirement, Project, RequirementLevel, Transition};
pub use gate::{ApprovalMode, GateRule, PromotionGate, RuleFamily, RuleKind};
pub use memory::MemoryStore;
pub use overrides::PolicyOverrides;
pub use package::{
    ApprovalCheckpoint, AutonomyPolicy, CompiledContextPackage, DataRequirements, DocumentRef,
    IntegrityRecord, NetworkRequirements, PackageMetadata, ProhibitedPattern, ProjectIdentity,
    RaiRequirements, RemediationEligibility, RequiredTests, SecurityRequirements, SourceDocuments,
    HASH_ALG,
};
pub use store::{
    ApprovalStore, ComplianceAssessor, DocumentStore, EvaluationStore, EvidenceStore,
    ExceptionStore, FindingStore, FrameworkStore, GovernanceStore, PackageStore, ProjectStore,
    TaskCreation, TaskPacketStore,
};
pub use task::{TaskPacket, TaskPriority, TaskStatus};
