// evaluation.rs - Per-rule results and the aggregate gate outcome.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::framework::Transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleStatus::Pass => write!(f, "pass"),
            RuleStatus::Fail => write!(f, "fail"),
            RuleStatus::Skip => write!(f, "skip"),
        }
    }
}

/// Outcome of one rule against one evaluation context. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluationResult {
    pub rule_id: String,
    pub rule_type: String,
    pub status: RuleStatus,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Passed,
    Partial,
    Failed,
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationStatus::Passed => write!(f, "passed"),
            EvaluationStatus::Partial => write!(f, "partial"),
            EvaluationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Aggregate outcome of one gate evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionEvaluation {
    pub evaluation_id: Uuid,
    pub project_id: String,
    pub gate_id: String,
    pub transition: Transition,
    pub results: Vec<RuleEvaluationResult>,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// `round(passed / (passed + failed) * 100, 1)`. Skipped rules are not
    /// applicable and do not count toward the total.
    pub progress_pct: f64,
    /// Failure messages, in rule order.
    pub blockers: Vec<String>,
    pub status: EvaluationStatus,
    pub evaluated_at: DateTime<Utc>,
}

impl PromotionEvaluation {
    /// Aggregate rule results into a gate outcome.
    pub fn aggregate(
        project_id: impl Into<String>,
        gate_id: impl Into<String>,
        transition: Transition,
        results: Vec<RuleEvaluationResult>,
    ) -> Self {
        let count = |status: RuleStatus| results.iter().filter(|r| r.status == status).count();
        let passed = count(RuleStatus::Pass);
        let failed = count(RuleStatus::Fail);
        let skipped = count(RuleStatus::Skip);

        let total = passed + failed;
        let progress_pct = if total == 0 {
            100.0
        } else {
            (passed as f64 / total as f64 * 1000.0).round() / 10.0
        };

        let status = if failed == 0 {
            EvaluationStatus::Passed
        } else if passed > 0 {
            EvaluationStatus::Partial
        } else {
            EvaluationStatus::Failed
        };

        let blockers = results
            .iter()
            .filter(|r| r.status == RuleStatus::Fail)
            .map(|r| r.message.clone())
            .collect();

        Self {
            evaluation_id: Uuid::new_v4(),
            project_id: project_id.into(),
            gate_id: gate_id.into(),
            transition,
            results,
            passed,
            failed,
            skipped,
            progress_pct,
            blockers,
            status,
            evaluated_at: Utc::now(),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == EvaluationStatus::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: usize, status: RuleStatus) -> RuleEvaluationResult {
        RuleEvaluationResult {
            rule_id: format!("r{}", id),
            rule_type: "test".to_string(),
            status,
            message: format!("rule {} {}", id, status),
            details: serde_json::Value::Null,
        }
    }

    fn aggregate(statuses: &[RuleStatus]) -> PromotionEvaluation {
        let results = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| result(i, *s))
            .collect();
        PromotionEvaluation::aggregate("p", "g", Transition::new("dev", "preprod"), results)
    }

    #[test]
    fn seven_of_ten_is_partial_at_seventy_percent() {
        let mut statuses = vec![RuleStatus::Pass; 7];
        statuses.extend([RuleStatus::Fail; 3]);
        let eval = aggregate(&statuses);
        assert_eq!(eval.progress_pct, 70.0);
        assert_eq!(eval.status, EvaluationStatus::Partial);
        assert_eq!(eval.blockers.len(), 3);
        assert_eq!(eval.blockers[0], "rule 7 fail");
    }

    #[test]
    fn all_failing_is_failed() {
        let eval = aggregate(&[RuleStatus::Fail, RuleStatus::Fail]);
        assert_eq!(eval.status, EvaluationStatus::Failed);
        assert_eq!(eval.progress_pct, 0.0);
    }

    #[test]
    fn skips_do_not_count_toward_progress() {
        let eval = aggregate(&[RuleStatus::Pass, RuleStatus::Skip, RuleStatus::Skip]);
        assert_eq!(eval.status, EvaluationStatus::Passed);
        assert_eq!(eval.skipped, 2);
        assert_eq!(eval.progress_pct, 100.0);
    }

    #[test]
    fn progress_rounds_to_one_decimal() {
        let eval = aggregate(&[RuleStatus::Pass, RuleStatus::Fail, RuleStatus::Fail]);
        assert_eq!(eval.progress_pct, 33.3);
    }
}
