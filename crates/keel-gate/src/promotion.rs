// promotion.rs - Promotion on a passing gate.
//
// `request_promotion` is the only operation that moves a project between
// environments. It evaluates the gate first; a gate that does not pass
// blocks. A passing `auto` gate records the new environment immediately. A
// passing `manual` gate needs an approved promotion request for the same
// transition: if none exists yet, one is raised (or the pending one is
// reused) and the caller is told to wait. Each approval is spent by the
// promotion it authorizes, so moving back to the source environment needs
// a fresh human decision.
//
// Nothing here runs on its own. Closing a remediation packet does not
// re-request promotion; the caller decides when to try again.

use chrono::Utc;
use keel_audit::{AuditAction, AuditEvent};
use keel_model::{
    ApprovalMode, ApprovalRequest, ApprovalStatus, ApprovalStore, PackageStore,
    PromotionEvaluation, PromotionGate, ProjectStore, TaskCreation, Transition,
};
use serde_json::json;
use uuid::Uuid;

use crate::error::GateError;
use crate::evaluator::GateEvaluator;

/// Approval request type for a transition, e.g. `promotion:dev->preprod`.
pub fn promotion_request_type(transition: &Transition) -> String {
    format!("promotion:{}", transition)
}

#[derive(Debug, Clone)]
pub enum PromotionOutcome {
    /// The gate did not pass.
    Blocked {
        evaluation: PromotionEvaluation,
        blockers: Vec<String>,
        remediation: Vec<TaskCreation>,
    },
    /// The gate passed; a human must approve the pending request.
    AwaitingApproval {
        evaluation: PromotionEvaluation,
        request: ApprovalRequest,
    },
    /// The project now runs in `environment`.
    Promoted {
        evaluation: PromotionEvaluation,
        environment: String,
    },
}

impl PromotionOutcome {
    pub fn evaluation(&self) -> &PromotionEvaluation {
        match self {
            PromotionOutcome::Blocked { evaluation, .. }
            | PromotionOutcome::AwaitingApproval { evaluation, .. }
            | PromotionOutcome::Promoted { evaluation, .. } => evaluation,
        }
    }

    pub fn is_promoted(&self) -> bool {
        matches!(self, PromotionOutcome::Promoted { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            PromotionOutcome::Blocked { .. } => "blocked",
            PromotionOutcome::AwaitingApproval { .. } => "awaiting_approval",
            PromotionOutcome::Promoted { .. } => "promoted",
        }
    }
}

impl GateEvaluator {
    /// Evaluate `gate` and promote the project if it passes.
    pub fn request_promotion(
        &self,
        project_id: &str,
        gate: &PromotionGate,
    ) -> Result<PromotionOutcome, GateError> {
        let project = self
            .store
            .get_project(project_id)?
            .ok_or_else(|| GateError::ProjectNotFound {
                project_id: project_id.to_string(),
            })?;
        if project.current_environment != gate.source_environment {
            return Err(GateError::WrongSourceEnvironment {
                gate_id: gate.gate_id.clone(),
                project_id: project_id.to_string(),
                expected: gate.source_environment.clone(),
                actual: project.current_environment,
            });
        }

        let run = self.evaluate(project_id, gate)?;
        let evaluation = run.evaluation;

        let outcome = if !evaluation.is_passed() {
            PromotionOutcome::Blocked {
                blockers: evaluation.blockers.clone(),
                evaluation,
                remediation: run.remediation,
            }
        } else {
            match gate.approval_mode {
                ApprovalMode::Auto => self.promote(project_id, gate, evaluation)?,
                ApprovalMode::Manual => self.promote_when_approved(project_id, gate, evaluation)?,
            }
        };

        tracing::info!(
            project_id = %project_id,
            gate_id = %gate.gate_id,
            outcome = outcome.label(),
            "promotion requested"
        );
        let event = AuditEvent::new("gate-evaluator", AuditAction::PromotionRequested)
            .with_project(project_id)
            .with_subject(&gate.gate_id)
            .with_outcome(outcome.label(), promotion_reason(&outcome))
            .with_metadata(json!({
                "transition": gate.transition().to_string(),
                "evaluation_id": outcome.evaluation().evaluation_id,
            }));
        let _ignored = self.auditor.emit(event);

        Ok(outcome)
    }

    fn promote(
        &self,
        project_id: &str,
        gate: &PromotionGate,
        evaluation: PromotionEvaluation,
    ) -> Result<PromotionOutcome, GateError> {
        self.store
            .record_environment(project_id, &gate.target_environment)?;
        Ok(PromotionOutcome::Promoted {
            evaluation,
            environment: gate.target_environment.clone(),
        })
    }

    fn promote_when_approved(
        &self,
        project_id: &str,
        gate: &PromotionGate,
        evaluation: PromotionEvaluation,
    ) -> Result<PromotionOutcome, GateError> {
        let transition = gate.transition();
        let request_type = promotion_request_type(&transition);
        let requests: Vec<ApprovalRequest> = self
            .store
            .approvals(project_id)?
            .into_iter()
            .filter(|r| r.request_type == request_type)
            .collect();

        // An approval authorizes one promotion; it is consumed before the
        // environment changes.
        if let Some(approved) = requests.iter().find(|r| r.status == ApprovalStatus::Approved) {
            self.store
                .set_approval_status(&approved.request_id, ApprovalStatus::Consumed)?;
            tracing::info!(
                project_id = %project_id,
                request_id = %approved.request_id,
                "promotion approval consumed"
            );
            return self.promote(project_id, gate, evaluation);
        }
        if let Some(pending) = requests.into_iter().find(|r| r.status == ApprovalStatus::Pending) {
            return Ok(PromotionOutcome::AwaitingApproval {
                evaluation,
                request: pending,
            });
        }

        let request = ApprovalRequest {
            request_id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            request_type,
            status: ApprovalStatus::Pending,
            required_roles: self.deployment_roles(project_id)?,
            summary: Some(format!(
                "Promote {} from {} (gate '{}' passed)",
                project_id, transition, gate.gate_id
            )),
            requested_at: Utc::now(),
        };
        self.store.create_approval_request(&request)?;
        Ok(PromotionOutcome::AwaitingApproval {
            evaluation,
            request,
        })
    }

    /// Roles the compiled package requires for deployment.
    fn deployment_roles(&self, project_id: &str) -> Result<Vec<String>, GateError> {
        Ok(self
            .store
            .latest_package(project_id)?
            .and_then(|p| {
                p.approval_checkpoints
                    .into_iter()
                    .find(|c| c.checkpoint == "deployment")
            })
            .map(|c| c.required_roles)
            .unwrap_or_default())
    }
}

fn promotion_reason(outcome: &PromotionOutcome) -> String {
    match outcome {
        PromotionOutcome::Blocked { blockers, .. } => {
            format!("{} blocker(s): {}", blockers.len(), blockers.join("; "))
        }
        PromotionOutcome::AwaitingApproval { request, .. } => {
            format!("approval request {} pending", request.request_id)
        }
        PromotionOutcome::Promoted { environment, .. } => format!("now in {}", environment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_audit::{Auditor, MemoryAuditSink};
    use keel_model::{
        Finding, FindingSource, FindingStatus, GateRule, MemoryStore, Project, RuleKind, Severity,
    };
    use std::sync::Arc;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new().with_project(Project {
            project_id: "payments-api".to_string(),
            name: "Payments API".to_string(),
            org_id: None,
            business_unit_id: None,
            ai_enabled: false,
            current_environment: "dev".to_string(),
        }))
    }

    fn gate(mode: ApprovalMode) -> PromotionGate {
        PromotionGate {
            gate_id: "dev-to-preprod".to_string(),
            name: String::new(),
            source_environment: "dev".to_string(),
            target_environment: "preprod".to_string(),
            rules: vec![GateRule::new("critical", RuleKind::MaxCriticalFindings { max: 0 })],
            approval_mode: mode,
        }
    }

    fn environment(store: &MemoryStore) -> String {
        store
            .get_project("payments-api")
            .unwrap()
            .unwrap()
            .current_environment
    }

    #[test]
    fn failing_gate_blocks() {
        let store = store();
        store
            .add_finding(Finding {
                finding_id: "f1".to_string(),
                project_id: "payments-api".to_string(),
                title: "RCE".to_string(),
                severity: Severity::Critical,
                category: "sast".to_string(),
                source: FindingSource {
                    tool_name: "semgrep".to_string(),
                    tool_type: "sast".to_string(),
                },
                compliance_refs: vec![],
                cvss_score: Some(9.8),
                status: FindingStatus::Open,
            })
            .unwrap();
        let evaluator = GateEvaluator::new(store.clone());

        match evaluator.request_promotion("payments-api", &gate(ApprovalMode::Auto)).unwrap() {
            PromotionOutcome::Blocked { blockers, remediation, .. } => {
                assert_eq!(blockers.len(), 1);
                assert_eq!(remediation.len(), 1);
            }
            other => panic!("expected Blocked, got {:?}", other),
        }
        assert_eq!(environment(&store), "dev");
    }

    #[test]
    fn auto_gate_promotes() {
        let store = store();
        let evaluator = GateEvaluator::new(store.clone());
        let outcome = evaluator
            .request_promotion("payments-api", &gate(ApprovalMode::Auto))
            .unwrap();
        assert!(outcome.is_promoted());
        assert_eq!(environment(&store), "preprod");

        // Already promoted: the gate's source no longer matches.
        assert!(matches!(
            evaluator.request_promotion("payments-api", &gate(ApprovalMode::Auto)),
            Err(GateError::WrongSourceEnvironment { .. })
        ));
    }

    #[test]
    fn manual_gate_waits_for_one_request_then_promotes() {
        let store = store();
        let sink = Arc::new(MemoryAuditSink::new());
        let evaluator = GateEvaluator::new(store.clone()).with_auditor(Auditor::new(sink.clone()));
        let manual = gate(ApprovalMode::Manual);

        let request = match evaluator.request_promotion("payments-api", &manual).unwrap() {
            PromotionOutcome::AwaitingApproval { request, .. } => request,
            other => panic!("expected AwaitingApproval, got {:?}", other),
        };
        assert_eq!(request.request_type, "promotion:dev->preprod");

        // Asking again reuses the pending request.
        match evaluator.request_promotion("payments-api", &manual).unwrap() {
            PromotionOutcome::AwaitingApproval { request: again, .. } => {
                assert_eq!(again.request_id, request.request_id)
            }
            other => panic!("expected AwaitingApproval, got {:?}", other),
        }
        assert_eq!(store.approvals("payments-api").unwrap().len(), 1);
        assert_eq!(environment(&store), "dev");

        store
            .add_approval(ApprovalRequest {
                status: ApprovalStatus::Approved,
                request_id: "appr-2".to_string(),
                ..request
            })
            .unwrap();
        let outcome = evaluator.request_promotion("payments-api", &manual).unwrap();
        assert!(outcome.is_promoted());
        assert_eq!(environment(&store), "preprod");

        let promotions = sink
            .events()
            .iter()
            .filter(|e| e.action == AuditAction::PromotionRequested)
            .count();
        assert_eq!(promotions, 3);
    }

    #[test]
    fn approval_is_spent_by_its_promotion() {
        let store = store();
        let evaluator = GateEvaluator::new(store.clone());
        let manual = gate(ApprovalMode::Manual);

        let request = match evaluator.request_promotion("payments-api", &manual).unwrap() {
            PromotionOutcome::AwaitingApproval { request, .. } => request,
            other => panic!("expected AwaitingApproval, got {:?}", other),
        };
        store
            .set_approval_status(&request.request_id, ApprovalStatus::Approved)
            .unwrap();
        assert!(evaluator.request_promotion("payments-api", &manual).unwrap().is_promoted());
        let spent = store.approvals("payments-api").unwrap();
        assert_eq!(spent.len(), 1);
        assert_eq!(spent[0].status, ApprovalStatus::Consumed);

        // Rolled back to dev: the old approval does not carry over.
        store.record_environment("payments-api", "dev").unwrap();
        let second = match evaluator.request_promotion("payments-api", &manual).unwrap() {
            PromotionOutcome::AwaitingApproval { request, .. } => request,
            other => panic!("expected AwaitingApproval, got {:?}", other),
        };
        assert_ne!(second.request_id, request.request_id);
        assert_eq!(environment(&store), "dev");

        store
            .set_approval_status(&second.request_id, ApprovalStatus::Approved)
            .unwrap();
        assert!(evaluator.request_promotion("payments-api", &manual).unwrap().is_promoted());
        assert_eq!(environment(&store), "preprod");
    }
}
