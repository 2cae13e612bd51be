// governance.rs - Exceptions and environment posture.

use keel_model::{AutonomyMode, RiskLevel};
use serde_json::json;

use super::RuleOutcome;
use crate::context::EvaluationContext;

pub(super) fn max_active_exceptions(ctx: &EvaluationContext, max: usize) -> RuleOutcome {
    let count = ctx.exceptions.len();
    RuleOutcome::check(
        count <= max,
        format!("{} active exception(s), limit {}", count, max),
        format!("{} active exception(s) exceed limit {}", count, max),
    )
}

pub(super) fn compensating_controls(ctx: &EvaluationContext) -> RuleOutcome {
    let bare: Vec<&str> = ctx
        .exceptions
        .iter()
        .filter(|e| e.compensating_controls.is_empty())
        .map(|e| e.exception_id.as_str())
        .collect();
    if bare.is_empty() {
        RuleOutcome::pass("every active exception lists compensating controls")
    } else {
        RuleOutcome::fail(format!(
            "exception(s) without compensating controls: {}",
            bare.join(", ")
        ))
        .with_details(json!({ "exception_ids": bare }))
    }
}

pub(super) fn max_risk_level(ctx: &EvaluationContext, max: RiskLevel) -> RuleOutcome {
    let Some(profile) = &ctx.environment_profile else {
        return RuleOutcome::fail("no environment profile declares a risk level");
    };
    RuleOutcome::check(
        profile.risk_level <= max,
        format!("risk level {} within {}", profile.risk_level, max),
        format!("risk level {} exceeds {}", profile.risk_level, max),
    )
}

pub(super) fn autonomy_mode_allowed(ctx: &EvaluationContext, modes: &[AutonomyMode]) -> RuleOutcome {
    let Some(profile) = &ctx.environment_profile else {
        return RuleOutcome::fail("no environment profile declares an autonomy mode");
    };
    RuleOutcome::check(
        modes.contains(&profile.autonomy_mode),
        format!("autonomy mode {} is allowed", profile.autonomy_mode),
        format!("autonomy mode {} is not allowed here", profile.autonomy_mode),
    )
}
