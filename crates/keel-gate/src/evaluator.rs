// evaluator.rs - GateEvaluator: run a promotion gate for a project.
//
// One run is:
// 1. Assemble the EvaluationContext (every store read happens here)
// 2. Evaluate each rule in gate order against the context
// 3. Aggregate into a PromotionEvaluation and persist it
// 4. For each failing rule, create a remediation packet unless an open
//    one already exists for (project, rule)
//
// A store failure in step 1 aborts before anything is persisted. Rule
// evaluation itself cannot abort the run.

use std::sync::Arc;

use chrono::Utc;
use keel_audit::{AuditAction, AuditEvent, Auditor};
use keel_model::{
    ComplianceAssessor, EvaluationStore, GateRule, GovernanceStore, PromotionEvaluation,
    PromotionGate, RuleEvaluationResult, RuleKind, RuleStatus, TaskCreation, TaskPacketStore,
    Transition,
};
use serde_json::json;

use crate::config::GateConfig;
use crate::context::{ContextAssembler, EvaluationContext};
use crate::error::GateError;
use crate::evaluators::{self, RuleOutcome};
use crate::remediation::RemediationPlanner;

/// The result of one gate run.
#[derive(Debug, Clone)]
pub struct GateRun {
    pub evaluation: PromotionEvaluation,
    /// One entry per failing rule, in rule order: the packet created by this
    /// run, or the open packet that already covered the rule.
    pub remediation: Vec<TaskCreation>,
}

impl GateRun {
    /// Packets newly created by this run.
    pub fn created(&self) -> usize {
        self.remediation.iter().filter(|c| c.was_created()).count()
    }
}

pub struct GateEvaluator {
    pub(crate) store: Arc<dyn GovernanceStore>,
    assessor: Arc<dyn ComplianceAssessor>,
    config: GateConfig,
    pub(crate) auditor: Auditor,
}

impl GateEvaluator {
    /// Build an evaluator over one backend that also assesses compliance.
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: GovernanceStore + ComplianceAssessor + 'static,
    {
        Self {
            store: store.clone(),
            assessor: store,
            config: GateConfig::default(),
            auditor: Auditor::disabled(),
        }
    }

    /// Use a separate compliance-assessment collaborator.
    pub fn with_assessor(mut self, assessor: Arc<dyn ComplianceAssessor>) -> Self {
        self.assessor = assessor;
        self
    }

    pub fn with_config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_auditor(mut self, auditor: Auditor) -> Self {
        self.auditor = auditor;
        self
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Read everything the rules of a transition may look at.
    pub fn assemble_context(
        &self,
        project_id: &str,
        transition: &Transition,
    ) -> Result<EvaluationContext, GateError> {
        ContextAssembler::new(self.store.as_ref(), self.assessor.as_ref())
            .with_fairness_max_age_days(self.config.fairness.max_evidence_age_days)
            .assemble(project_id, transition, Utc::now())
    }

    /// Evaluate `gate` for a project, persist the outcome and open
    /// remediation packets for its failures.
    ///
    /// Every rule sees the same [`EvaluationContext`] snapshot, taken once
    /// at the start. A rule that cannot reach a verdict, because its params
    /// are bad or its data is out of range, becomes a `fail` result and the
    /// remaining rules still run. Passing evaluations are saved too, so
    /// [`history`](Self::history) shows every attempt.
    ///
    /// Calling this twice for the same failures does not create duplicate
    /// task packets: the store returns the open packet instead.
    ///
    /// Errors are returned only for an unknown project or a failing store.
    pub fn evaluate(&self, project_id: &str, gate: &PromotionGate) -> Result<GateRun, GateError> {
        let transition = gate.transition();
        tracing::info!(
            project_id = %project_id,
            gate_id = %gate.gate_id,
            transition = %transition,
            rules = gate.rules.len(),
            "evaluating promotion gate"
        );

        let ctx = self.assemble_context(project_id, &transition)?;
        let results = evaluate_rules(gate, &ctx);

        let mut evaluation =
            PromotionEvaluation::aggregate(project_id, &gate.gate_id, transition, results);
        evaluation.evaluated_at = ctx.evaluated_at;
        self.store.save_evaluation(&evaluation)?;

        let remediation = if self.config.remediation.enabled {
            self.remediate(project_id, gate, &ctx, &evaluation)?
        } else {
            Vec::new()
        };

        tracing::info!(
            project_id = %project_id,
            gate_id = %gate.gate_id,
            status = %evaluation.status,
            passed = evaluation.passed,
            failed = evaluation.failed,
            skipped = evaluation.skipped,
            progress_pct = evaluation.progress_pct,
            "gate evaluated"
        );
        self.record_evaluation(&evaluation);

        Ok(GateRun {
            evaluation,
            remediation,
        })
    }

    /// Stored evaluations for a project, most recent first.
    pub fn history(&self, project_id: &str) -> Result<Vec<PromotionEvaluation>, GateError> {
        Ok(self.store.evaluation_history(project_id)?)
    }

    fn remediate(
        &self,
        project_id: &str,
        gate: &PromotionGate,
        ctx: &EvaluationContext,
        evaluation: &PromotionEvaluation,
    ) -> Result<Vec<TaskCreation>, GateError> {
        let planner = RemediationPlanner::new(&self.config.remediation, ctx.package.as_ref());
        let mut creations = Vec::new();

        for (rule, result) in gate.rules.iter().zip(&evaluation.results) {
            if result.status != RuleStatus::Fail {
                continue;
            }
            let packet = planner.packet(project_id, gate, rule, result, ctx.evaluated_at);
            let creation = self.store.create_if_absent(packet)?;
            if creation.was_created() {
                self.record_packet(&creation);
            } else {
                tracing::debug!(
                    project_id = %project_id,
                    rule_id = %rule.rule_id,
                    packet_id = %creation.packet().packet_id,
                    "open remediation packet already exists"
                );
            }
            creations.push(creation);
        }
        Ok(creations)
    }

    fn record_evaluation(&self, evaluation: &PromotionEvaluation) {
        let event = AuditEvent::new("gate-evaluator", AuditAction::GateEvaluated)
            .with_project(&evaluation.project_id)
            .with_subject(&evaluation.gate_id)
            .with_outcome(
                evaluation.status.to_string(),
                format!("{} passed, {} failed, {} skipped", evaluation.passed, evaluation.failed, evaluation.skipped),
            )
            .with_metadata(json!({
                "evaluation_id": evaluation.evaluation_id,
                "transition": evaluation.transition.to_string(),
                "progress_pct": evaluation.progress_pct,
                "blockers": evaluation.blockers,
            }));
        let _ignored = self.auditor.emit(event);
    }

    fn record_packet(&self, creation: &TaskCreation) {
        let packet = creation.packet();
        tracing::info!(
            project_id = %packet.project_id,
            rule_id = %packet.rule_id,
            packet_id = %packet.packet_id,
            priority = ?packet.priority,
            "remediation packet created"
        );
        let event = AuditEvent::new("gate-evaluator", AuditAction::RemediationCreated)
            .with_project(&packet.project_id)
            .with_subject(packet.packet_id.to_string())
            .with_outcome("created", &packet.failure_message)
            .with_metadata(json!({
                "gate_id": packet.gate_id,
                "rule_id": packet.rule_id,
                "human_only": packet.human_only,
            }));
        let _ignored = self.auditor.emit(event);
    }
}

/// Evaluate every rule of a gate against a context, in gate order.
pub fn evaluate_rules(gate: &PromotionGate, ctx: &EvaluationContext) -> Vec<RuleEvaluationResult> {
    gate.rules
        .iter()
        .map(|rule| {
            let outcome = evaluate_rule(rule, ctx);
            RuleEvaluationResult {
                rule_id: rule.rule_id.clone(),
                rule_type: rule.rule_type.clone(),
                status: outcome.status,
                message: outcome.message,
                details: outcome.details,
            }
        })
        .collect()
}

fn evaluate_rule(rule: &GateRule, ctx: &EvaluationContext) -> RuleOutcome {
    if rule.ai_only && !ctx.ai_enabled {
        return RuleOutcome::skip("project is not AI-enabled; rule does not apply");
    }
    let kind = match rule.kind() {
        Ok(kind) => kind,
        Err(e) => return RuleOutcome::fail(e.to_string()),
    };
    if kind == RuleKind::Unknown {
        tracing::warn!(rule_id = %rule.rule_id, rule_type = %rule.rule_type, "unknown rule type");
        return RuleOutcome::skip(format!("unknown rule type '{}'; skipped", rule.rule_type));
    }
    match evaluators::evaluate(&kind, ctx) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(rule_id = %rule.rule_id, error = %e, "rule evaluation failed");
            RuleOutcome::fail(format!("rule evaluation error: {}", e))
        }
    }
}
