// documents.rs - Document and report presence.

use serde_json::json;

use super::RuleOutcome;
use crate::context::EvaluationContext;

pub(super) fn org_baseline_present(ctx: &EvaluationContext) -> RuleOutcome {
    match &ctx.org_baseline {
        Some(b) => RuleOutcome::pass(format!("org baseline {} v{} is active", b.baseline_id, b.version)),
        None => RuleOutcome::fail("no active org baseline"),
    }
}

pub(super) fn app_spec_present(ctx: &EvaluationContext) -> RuleOutcome {
    match &ctx.app_spec {
        Some(s) => RuleOutcome::pass(format!("application spec {} v{} is active", s.spec_id, s.version)),
        None => RuleOutcome::fail("no active application spec"),
    }
}

pub(super) fn environment_profile_present(ctx: &EvaluationContext) -> RuleOutcome {
    match &ctx.environment_profile {
        Some(p) => RuleOutcome::pass(format!(
            "environment profile {} ({}) is active",
            p.profile_id, p.environment
        )),
        None => RuleOutcome::fail("no active environment profile"),
    }
}

/// A package must exist and still match its recorded hash.
pub(super) fn compiled_package_present(ctx: &EvaluationContext) -> RuleOutcome {
    let Some(package) = &ctx.package else {
        return RuleOutcome::fail("no compiled context package");
    };
    let details = json!({
        "package_id": package.package_id(),
        "revision": package.revision(),
    });
    match package.verify_integrity() {
        Ok(()) => RuleOutcome::pass(format!("context package revision {} is compiled", package.revision()))
            .with_details(details),
        Err(e) => RuleOutcome::fail(format!("context package failed integrity check: {}", e))
            .with_details(details),
    }
}

pub(super) fn report_present(ctx: &EvaluationContext, report_type: &str) -> RuleOutcome {
    RuleOutcome::check(
        ctx.has_report(report_type),
        format!("'{}' report present", report_type),
        format!("no '{}' report", report_type),
    )
}
