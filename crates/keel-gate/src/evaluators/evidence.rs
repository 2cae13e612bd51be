// evidence.rs - Test reports, SBOMs and scan targets.

use keel_model::ScanRunStatus;
use serde_json::json;

use super::RuleOutcome;
use crate::context::EvaluationContext;

pub(super) fn test_report_present(ctx: &EvaluationContext, test_type: &str) -> RuleOutcome {
    let wanted = [format!("{}_test", test_type), format!("{}_tests", test_type)];
    let found = ctx
        .reports
        .iter()
        .any(|r| r.report_type == test_type || wanted.contains(&r.report_type));
    RuleOutcome::check(
        found,
        format!("{} test report present", test_type),
        format!("no {} test report", test_type),
    )
}

pub(super) fn sbom_present(ctx: &EvaluationContext) -> RuleOutcome {
    RuleOutcome::check(ctx.has_report("sbom"), "SBOM present", "no SBOM report")
}

pub(super) fn scan_targets_registered(ctx: &EvaluationContext, min: usize) -> RuleOutcome {
    let count = ctx.scan_targets.len();
    RuleOutcome::check(
        count >= min,
        format!("{} scan target(s) registered", count),
        format!("{} scan target(s) registered, at least {} required", count, min),
    )
}

/// Every registered target's last run passed. No targets is a failure.
pub(super) fn scan_targets_passing(ctx: &EvaluationContext) -> RuleOutcome {
    if ctx.scan_targets.is_empty() {
        return RuleOutcome::fail("no scan targets registered");
    }
    let not_passing: Vec<&str> = ctx
        .scan_targets
        .iter()
        .filter(|t| t.last_run_status != Some(ScanRunStatus::Passed))
        .map(|t| t.name.as_str())
        .collect();
    if not_passing.is_empty() {
        RuleOutcome::pass(format!("all {} scan target(s) passing", ctx.scan_targets.len()))
    } else {
        RuleOutcome::fail(format!(
            "{} scan target(s) not passing: {}",
            not_passing.len(),
            not_passing.join(", ")
        ))
        .with_details(json!({ "targets": not_passing }))
    }
}

pub(super) fn scan_coverage(ctx: &EvaluationContext, tool_type: &str) -> RuleOutcome {
    let covered = ctx
        .scan_targets
        .iter()
        .any(|t| t.tool_type.eq_ignore_ascii_case(tool_type));
    RuleOutcome::check(
        covered,
        format!("'{}' scan target registered", tool_type),
        format!("no '{}' scan target registered", tool_type),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::testing::context;
    use chrono::Utc;
    use keel_model::{ReportRecord, RuleStatus, ScanTarget};

    fn target(name: &str, status: Option<ScanRunStatus>) -> ScanTarget {
        ScanTarget {
            target_id: name.to_string(),
            project_id: "payments-api".to_string(),
            name: name.to_string(),
            tool_type: "sast".to_string(),
            last_run_status: status,
            last_run_at: None,
        }
    }

    #[test]
    fn scan_targets_must_exist_and_pass() {
        let mut ctx = context();
        assert_eq!(scan_targets_passing(&ctx).status, RuleStatus::Fail);

        ctx.scan_targets = vec![target("api", Some(ScanRunStatus::Passed))];
        assert_eq!(scan_targets_passing(&ctx).status, RuleStatus::Pass);

        ctx.scan_targets.push(target("web", None));
        let outcome = scan_targets_passing(&ctx);
        assert_eq!(outcome.status, RuleStatus::Fail);
        assert!(outcome.message.contains("web"));
        assert_eq!(scan_coverage(&ctx, "SAST").status, RuleStatus::Pass);
        assert_eq!(scan_coverage(&ctx, "dast").status, RuleStatus::Fail);
    }

    #[test]
    fn test_report_accepts_suffixed_types() {
        let mut ctx = context();
        ctx.reports.push(ReportRecord {
            report_id: "r1".to_string(),
            project_id: "payments-api".to_string(),
            report_type: "security_tests".to_string(),
            control_refs: vec![],
            created_at: Utc::now(),
        });
        assert_eq!(test_report_present(&ctx, "security").status, RuleStatus::Pass);
        assert_eq!(test_report_present(&ctx, "rai").status, RuleStatus::Fail);
        assert_eq!(sbom_present(&ctx).status, RuleStatus::Fail);
    }
}
