//! # keel-gate
//!
//! Decides whether a project may move from one environment to the next.
//!
//! A [`PromotionGate`](keel_model::PromotionGate) is an ordered list of
//! rules. [`GateEvaluator`] runs every rule against one read-only
//! [`EvaluationContext`] snapshot, aggregates the results into a
//! [`PromotionEvaluation`](keel_model::PromotionEvaluation), persists it,
//! and makes sure exactly one open remediation
//! [`TaskPacket`](keel_model::TaskPacket) exists for each failing rule.
//!
//! ## Evaluation flow
//!
//! ```text
//! assemble context ─▶ evaluate rules ─▶ aggregate ─▶ persist ─▶ remediation
//!   (all I/O here)      (pure)                                (create_if_absent)
//! ```
//!
//! Rule evaluators never touch storage. An evaluator that errors produces a
//! `fail` result with the error message; an unknown rule type produces a
//! `skip`. Neither aborts the gate.
//!
//! [`GateEvaluator::request_promotion`] builds on evaluation: a passing gate
//! either promotes immediately (`auto`) or raises an approval request
//! (`manual`).

pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod evaluators;
pub mod promotion;
pub mod remediation;
pub mod resolver;

pub use config::GateConfig;
pub use context::{ApprovalSummary, ComplianceState, ContextAssembler, EvaluationContext, FindingSummary};
pub use error::GateError;
pub use evaluator::{evaluate_rules, GateEvaluator, GateRun};
pub use evaluators::{RuleError, RuleOutcome};
pub use promotion::{promotion_request_type, PromotionOutcome};
pub use remediation::{priority_for, RemediationPlanner};
pub use resolver::{resolve_requirements, RequirementResolver};
