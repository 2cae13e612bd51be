// findings.rs - Open finding thresholds.

use keel_model::{Finding, Severity};
use serde_json::json;

use super::{RuleError, RuleOutcome};
use crate::context::EvaluationContext;

fn is_kind(finding: &Finding, category: &str, tool_type: &str) -> bool {
    finding.category.eq_ignore_ascii_case(category)
        || finding.source.tool_type.eq_ignore_ascii_case(tool_type)
}

/// Fails listing the matching findings, passes when none match.
pub(super) fn none_matching(
    ctx: &EvaluationContext,
    what: &str,
    predicate: impl Fn(&Finding) -> bool,
) -> RuleOutcome {
    let ids = ctx.findings.ids_where(predicate);
    if ids.is_empty() {
        RuleOutcome::pass(format!("no open {} findings", what))
    } else {
        RuleOutcome::fail(format!("{} open {} finding(s)", ids.len(), what))
            .with_details(json!({ "finding_ids": ids }))
    }
}

fn at_most(count: usize, max: usize, what: &str) -> RuleOutcome {
    RuleOutcome::check(
        count <= max,
        format!("{} open {} finding(s), limit {}", count, what, max),
        format!("{} open {} finding(s) exceed limit {}", count, what, max),
    )
    .with_details(json!({ "count": count, "max": max }))
}

pub(super) fn no_secrets_detected(ctx: &EvaluationContext) -> RuleOutcome {
    none_matching(ctx, "secret", |f| is_kind(f, "secrets", "secrets"))
}

pub(super) fn max_severity(ctx: &EvaluationContext, severity: Severity, max: usize) -> RuleOutcome {
    at_most(ctx.findings.severity(severity), max, &severity.to_string())
}

pub(super) fn max_open(ctx: &EvaluationContext, max: usize) -> RuleOutcome {
    let count = ctx.findings.total();
    RuleOutcome::check(
        count <= max,
        format!("{} open finding(s), limit {}", count, max),
        format!("{} open finding(s) exceed limit {}", count, max),
    )
    .with_details(json!({ "count": count, "max": max }))
}

pub(super) fn no_findings_in_category(ctx: &EvaluationContext, category: &str) -> RuleOutcome {
    none_matching(ctx, &format!("'{}'", category), |f| {
        f.category.eq_ignore_ascii_case(category)
    })
}

pub(super) fn max_by_tool(ctx: &EvaluationContext, tool_name: &str, max: usize) -> RuleOutcome {
    at_most(ctx.findings.tool_name(tool_name), max, &format!("'{}'", tool_name))
}

pub(super) fn max_cvss(ctx: &EvaluationContext, threshold: f64) -> Result<RuleOutcome, RuleError> {
    if !(0.0..=10.0).contains(&threshold) {
        return Err(RuleError(format!(
            "cvss threshold {} is outside 0.0-10.0",
            threshold
        )));
    }
    let over: Vec<String> = ctx
        .findings
        .ids_where(|f| f.cvss_score.is_some_and(|s| s >= threshold));
    Ok(if over.is_empty() {
        RuleOutcome::pass(format!("no open finding scores CVSS {:.1} or higher", threshold))
    } else {
        RuleOutcome::fail(format!(
            "{} open finding(s) score CVSS {:.1} or higher",
            over.len(),
            threshold
        ))
        .with_details(json!({ "finding_ids": over }))
    })
}

pub(super) fn no_dependency_vulnerabilities(ctx: &EvaluationContext) -> RuleOutcome {
    none_matching(ctx, "dependency", |f| is_kind(f, "dependency", "sca"))
}

pub(super) fn no_iac_misconfigurations(ctx: &EvaluationContext) -> RuleOutcome {
    none_matching(ctx, "IaC", |f| is_kind(f, "iac", "iac"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::context::FindingSummary;
    use crate::evaluators::testing::context;
    use keel_model::{FindingSource, FindingStatus, RuleStatus};

    pub(crate) fn finding(id: &str, severity: Severity, category: &str, tool_type: &str) -> Finding {
        Finding {
            finding_id: id.to_string(),
            project_id: "payments-api".to_string(),
            title: id.to_string(),
            severity,
            category: category.to_string(),
            source: FindingSource {
                tool_name: format!("{}-scanner", tool_type),
                tool_type: tool_type.to_string(),
            },
            compliance_refs: vec![],
            cvss_score: None,
            status: FindingStatus::Open,
        }
    }

    #[test]
    fn secrets_match_by_category_or_tool_type() {
        let mut ctx = context();
        assert_eq!(no_secrets_detected(&ctx).status, RuleStatus::Pass);

        ctx.findings = FindingSummary::from_findings(vec![finding("f1", Severity::High, "misc", "secrets")]);
        let outcome = no_secrets_detected(&ctx);
        assert_eq!(outcome.status, RuleStatus::Fail);
        assert_eq!(outcome.details["finding_ids"][0], "f1");
    }

    #[test]
    fn severity_threshold_is_inclusive() {
        let mut ctx = context();
        ctx.findings = FindingSummary::from_findings(vec![
            finding("f1", Severity::Critical, "misc", "sast"),
            finding("f2", Severity::High, "misc", "sast"),
        ]);
        assert_eq!(max_severity(&ctx, Severity::Critical, 1).status, RuleStatus::Pass);
        assert_eq!(max_severity(&ctx, Severity::Critical, 0).status, RuleStatus::Fail);
        assert_eq!(max_open(&ctx, 1).status, RuleStatus::Fail);
    }

    #[test]
    fn cvss_threshold() {
        let mut ctx = context();
        let mut scored = finding("f1", Severity::High, "dependency", "sca");
        scored.cvss_score = Some(9.8);
        ctx.findings = FindingSummary::from_findings(vec![scored, finding("f2", Severity::Low, "misc", "sast")]);
        assert_eq!(max_cvss(&ctx, 7.0).unwrap().status, RuleStatus::Fail);
        assert_eq!(max_cvss(&ctx, 9.9).unwrap().status, RuleStatus::Pass);
        assert!(max_cvss(&ctx, 11.0).is_err());
        assert_eq!(no_dependency_vulnerabilities(&ctx).status, RuleStatus::Fail);
        assert_eq!(no_iac_misconfigurations(&ctx).status, RuleStatus::Pass);
    }
}
