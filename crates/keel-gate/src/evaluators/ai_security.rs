// ai_security.rs - AI-specific security posture.

use super::findings::none_matching;
use super::RuleOutcome;
use crate::context::EvaluationContext;

pub(super) fn no_prompt_injection(ctx: &EvaluationContext) -> RuleOutcome {
    none_matching(ctx, "prompt-injection", |f| {
        f.category.eq_ignore_ascii_case("prompt_injection")
    })
}

pub(super) fn no_ai_security_findings(ctx: &EvaluationContext) -> RuleOutcome {
    none_matching(ctx, "AI security", |f| {
        f.source.tool_type.eq_ignore_ascii_case("ai_security")
    })
}

pub(super) fn no_data_leakage(ctx: &EvaluationContext) -> RuleOutcome {
    none_matching(ctx, "data-leakage", |f| {
        f.category.eq_ignore_ascii_case("data_leakage")
    })
}

/// The application spec lists data that must never enter model context.
pub(super) fn model_context_restricted(ctx: &EvaluationContext) -> RuleOutcome {
    let Some(spec) = &ctx.app_spec else {
        return RuleOutcome::fail("no application spec to declare model-context restrictions");
    };
    RuleOutcome::check(
        !spec.prohibited_in_model_context.is_empty(),
        format!(
            "{} data type(s) barred from model context",
            spec.prohibited_in_model_context.len()
        ),
        "application spec declares no data barred from model context",
    )
}
