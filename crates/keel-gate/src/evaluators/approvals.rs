// approvals.rs - Human approval presence.

use super::RuleOutcome;
use crate::context::EvaluationContext;

pub(super) const SECURITY_REVIEW: &str = "security_review";
pub(super) const RAI_REVIEW: &str = "rai_review";

pub(super) fn approval_present(ctx: &EvaluationContext, request_type: &str) -> RuleOutcome {
    if ctx.approvals.has_approved(request_type) {
        return RuleOutcome::pass(format!("'{}' approved", request_type));
    }
    match ctx.approvals.pending_count(Some(request_type)) {
        0 => RuleOutcome::fail(format!("no approved '{}' request", request_type)),
        n => RuleOutcome::fail(format!(
            "'{}' not approved yet ({} pending)",
            request_type, n
        )),
    }
}

pub(super) fn no_pending(ctx: &EvaluationContext, request_type: Option<&str>) -> RuleOutcome {
    let pending = ctx.approvals.pending_count(request_type);
    let scope = request_type
        .map(|t| format!("'{}' ", t))
        .unwrap_or_default();
    RuleOutcome::check(
        pending == 0,
        format!("no pending {}approval requests", scope),
        format!("{} pending {}approval request(s)", pending, scope),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApprovalSummary;
    use crate::evaluators::testing::context;
    use keel_model::RuleStatus;

    #[test]
    fn pending_is_not_approved() {
        let mut ctx = context();
        ctx.approvals = ApprovalSummary::default();
        ctx.approvals.pending.insert(SECURITY_REVIEW.to_string(), 1);

        let outcome = approval_present(&ctx, SECURITY_REVIEW);
        assert_eq!(outcome.status, RuleStatus::Fail);
        assert!(outcome.message.contains("1 pending"));
        assert_eq!(no_pending(&ctx, None).status, RuleStatus::Fail);
        assert_eq!(no_pending(&ctx, Some(RAI_REVIEW)).status, RuleStatus::Pass);

        ctx.approvals.approved.insert(SECURITY_REVIEW.to_string(), 1);
        assert_eq!(approval_present(&ctx, SECURITY_REVIEW).status, RuleStatus::Pass);
    }
}
