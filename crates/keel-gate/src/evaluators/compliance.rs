// compliance.rs - Compliance scores, framework requirements and AIUC-1 controls.
//
// Control rules distinguish three states: an explicit `false` fails, an
// explicit `true` passes, and an unset control passes as "not yet
// assessed". An active exception naming the control waives it.

use keel_model::{Control, ControlDomain, ControlPath};
use serde_json::json;

use super::{RuleError, RuleOutcome};
use crate::context::{ComplianceState, EvaluationContext};

/// Score used when there were no scanner findings to assess.
const UNASSESSED_SCORE: f64 = 100.0;

fn score_against(score: f64, min_score: f64, what: &str) -> RuleOutcome {
    RuleOutcome::check(
        score >= min_score,
        format!("{} score {:.1} meets minimum {:.1}", what, score, min_score),
        format!("{} score {:.1} below minimum {:.1}", what, score, min_score),
    )
    .with_details(json!({ "score": score, "min_score": min_score }))
}

pub(super) fn min_score(ctx: &EvaluationContext, min_score: f64) -> Result<RuleOutcome, RuleError> {
    match &ctx.compliance {
        ComplianceState::NotAssessed => Ok(score_against(UNASSESSED_SCORE, min_score, "compliance")),
        ComplianceState::Assessed(a) => Ok(score_against(a.overall_score, min_score, "compliance")),
        ComplianceState::Unavailable(reason) => Err(RuleError(format!(
            "compliance assessment unavailable: {}",
            reason
        ))),
    }
}

/// A framework missing from the assessment breakdown is held to the
/// overall score.
pub(super) fn framework_score(
    ctx: &EvaluationContext,
    framework: &str,
    min_score: f64,
) -> Result<RuleOutcome, RuleError> {
    let score = match &ctx.compliance {
        ComplianceState::NotAssessed => UNASSESSED_SCORE,
        ComplianceState::Assessed(a) => a.frameworks.get(framework).copied().unwrap_or(a.overall_score),
        ComplianceState::Unavailable(reason) => {
            return Err(RuleError(format!(
                "compliance assessment unavailable: {}",
                reason
            )))
        }
    };
    Ok(score_against(score, min_score, framework))
}

/// Every mandatory requirement for the transition has evidence or a waiver.
pub(super) fn requirements_met(ctx: &EvaluationContext) -> RuleOutcome {
    if ctx.requirements.is_empty() {
        return RuleOutcome::pass("no framework requirements apply to this transition");
    }
    let mut unmet = Vec::new();
    let mut recommended_open = Vec::new();
    for requirement in &ctx.requirements {
        let satisfied = ctx.reports.iter().any(|r| {
            r.report_type == requirement.evidence_type || r.is_evidence_for(&requirement.control_id)
        }) || ctx.exception_covering(&requirement.control_id).is_some();
        if satisfied {
            continue;
        }
        if requirement.is_mandatory() {
            unmet.push(requirement.control_id.as_str());
        } else {
            recommended_open.push(requirement.control_id.as_str());
        }
    }
    let details = json!({
        "unmet_mandatory": unmet,
        "open_recommended": recommended_open,
    });
    if unmet.is_empty() {
        RuleOutcome::pass(format!(
            "{} framework requirement(s) satisfied",
            ctx.requirements.len() - recommended_open.len()
        ))
        .with_details(details)
    } else {
        RuleOutcome::fail(format!(
            "mandatory framework controls without evidence: {}",
            unmet.join(", ")
        ))
        .with_details(details)
    }
}

pub(super) fn control_required(
    ctx: &EvaluationContext,
    category: &str,
    control: &str,
) -> Result<RuleOutcome, RuleError> {
    let path = ControlPath::new(category, control)?;
    let key = path.to_string();

    if let Some(exception) = ctx.exception_covering(&key) {
        return Ok(RuleOutcome::pass(format!(
            "{} waived by exception {}",
            key, exception.exception_id
        )));
    }
    let Some(controls) = ctx.controls() else {
        return Ok(RuleOutcome::fail(format!(
            "no baseline controls available to check {}",
            key
        )));
    };
    Ok(match controls.get(&path) {
        Control::Enabled => RuleOutcome::pass(format!("{} is enabled", key)),
        Control::Disabled => RuleOutcome::fail(format!("{} is explicitly disabled", key)),
        Control::Unset => RuleOutcome::pass(format!("{} not yet assessed", key)),
    }
    .with_details(json!({ "control": key, "value": controls.get(&path).to_string() })))
}

/// Every control in the domain carries an explicit value.
pub(super) fn domain_assessed(ctx: &EvaluationContext, category: &str) -> Result<RuleOutcome, RuleError> {
    let domain: ControlDomain = category
        .parse()
        .map_err(|_| RuleError(format!("unknown control domain '{}'", category)))?;
    let Some(controls) = ctx.controls() else {
        return Ok(RuleOutcome::fail(format!(
            "no baseline controls available to assess {}",
            domain
        )));
    };
    let unset = controls.unset_in(domain);
    Ok(if unset.is_empty() {
        RuleOutcome::pass(format!("every {} control is assessed", domain))
    } else {
        RuleOutcome::fail(format!(
            "{} {} control(s) not assessed: {}",
            unset.len(),
            domain,
            unset.join(", ")
        ))
        .with_details(json!({ "unset": unset }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::testing::context;
    use chrono::{Duration, Utc};
    use keel_model::{
        ComplianceAssessment, ControlDomains, Exception, ExceptionScope, ExceptionStatus,
        FrameworkRequirement, OrgBaseline, ReportRecord, RequirementLevel, RuleStatus,
    };

    fn with_controls(entries: &[(&str, Control)]) -> crate::context::EvaluationContext {
        let mut controls = ControlDomains::default();
        for (path, value) in entries {
            controls.set(&ControlPath::parse(path).unwrap(), *value);
        }
        let mut ctx = context();
        ctx.org_baseline = Some(OrgBaseline {
            baseline_id: "base-1".to_string(),
            org_id: "acme".to_string(),
            version: 1,
            controls,
            coding: Default::default(),
            iam: Default::default(),
            network: Default::default(),
            data: Default::default(),
            testing: Default::default(),
        });
        ctx
    }

    fn exception(control: &str) -> Exception {
        Exception {
            exception_id: "exc-1".to_string(),
            project_id: "payments-api".to_string(),
            title: "waiver".to_string(),
            scope: ExceptionScope {
                controls: vec![control.to_string()],
                ..Default::default()
            },
            compensating_controls: vec!["manual review".to_string()],
            status: ExceptionStatus::Active,
            approved_by: Some("ciso".to_string()),
            expires_at: Utc::now() + Duration::days(7),
        }
    }

    #[test]
    fn control_three_valued_logic() {
        let ctx = with_controls(&[
            ("security.mfa_enforced", Control::Enabled),
            ("safety.human_oversight", Control::Disabled),
            ("reliability.failover", Control::Unset),
        ]);
        let status = |c: &str, n: &str| control_required(&ctx, c, n).unwrap().status;
        assert_eq!(status("security", "mfa_enforced"), RuleStatus::Pass);
        assert_eq!(status("safety", "human_oversight"), RuleStatus::Fail);
        assert_eq!(status("reliability", "failover"), RuleStatus::Pass);
        assert_eq!(status("society", "never_listed"), RuleStatus::Pass);
        assert!(control_required(&ctx, "finance", "x").is_err());
    }

    #[test]
    fn exception_waives_disabled_control() {
        let mut ctx = with_controls(&[("safety.human_oversight", Control::Disabled)]);
        ctx.exceptions.push(exception("safety.human_oversight"));
        let outcome = control_required(&ctx, "safety", "human_oversight").unwrap();
        assert_eq!(outcome.status, RuleStatus::Pass);
        assert!(outcome.message.contains("exc-1"));
    }

    #[test]
    fn exception_scoped_to_another_environment_does_not_waive() {
        let mut ctx = with_controls(&[("safety.human_oversight", Control::Disabled)]);
        let mut waiver = exception("safety.human_oversight");
        waiver.scope.environments = vec!["dev".to_string()];
        ctx.exceptions.push(waiver);
        assert_eq!(
            control_required(&ctx, "safety", "human_oversight").unwrap().status,
            RuleStatus::Fail
        );

        ctx.exceptions[0].scope.environments.push("preprod".to_string());
        assert_eq!(
            control_required(&ctx, "safety", "human_oversight").unwrap().status,
            RuleStatus::Pass
        );
    }

    #[test]
    fn missing_controls_fail() {
        let ctx = context();
        assert_eq!(control_required(&ctx, "security", "mfa").unwrap().status, RuleStatus::Fail);
    }

    #[test]
    fn domain_assessment_lists_unset_controls() {
        let ctx = with_controls(&[
            ("security.mfa_enforced", Control::Enabled),
            ("security.pentest_annual", Control::Unset),
        ]);
        let outcome = domain_assessed(&ctx, "security").unwrap();
        assert_eq!(outcome.status, RuleStatus::Fail);
        assert!(outcome.message.contains("pentest_annual"));
        assert_eq!(domain_assessed(&ctx, "safety").unwrap().status, RuleStatus::Pass);
    }

    #[test]
    fn compliance_scores() {
        let mut ctx = context();
        assert_eq!(min_score(&ctx, 80.0).unwrap().status, RuleStatus::Pass);

        ctx.compliance = ComplianceState::Assessed(ComplianceAssessment {
            overall_score: 65.0,
            frameworks: [("soc2".to_string(), 90.0)].into_iter().collect(),
        });
        assert_eq!(min_score(&ctx, 80.0).unwrap().status, RuleStatus::Fail);
        assert_eq!(framework_score(&ctx, "soc2", 80.0).unwrap().status, RuleStatus::Pass);
        assert_eq!(framework_score(&ctx, "iso27001", 80.0).unwrap().status, RuleStatus::Fail);

        ctx.compliance = ComplianceState::Unavailable("timeout".to_string());
        assert!(min_score(&ctx, 80.0).is_err());
    }

    #[test]
    fn mandatory_requirements_need_evidence_or_waiver() {
        let requirement = |id: &str, level| FrameworkRequirement {
            framework_id: "soc2".to_string(),
            control_id: id.to_string(),
            title: String::new(),
            applies_to_transitions: vec!["*".to_string()],
            requirement_level: level,
            evidence_type: "pentest".to_string(),
        };
        let mut ctx = context();
        ctx.requirements = vec![
            requirement("CC6.1", RequirementLevel::Mandatory),
            requirement("CC7.2", RequirementLevel::Recommended),
        ];
        let outcome = requirements_met(&ctx);
        assert_eq!(outcome.status, RuleStatus::Fail);
        assert_eq!(outcome.details["unmet_mandatory"][0], "CC6.1");

        let mut dev_only = exception("CC6.1");
        dev_only.scope.environments = vec!["dev".to_string()];
        ctx.exceptions.push(dev_only);
        assert_eq!(requirements_met(&ctx).status, RuleStatus::Fail);

        ctx.exceptions = vec![exception("CC6.1")];
        assert_eq!(requirements_met(&ctx).status, RuleStatus::Pass);

        ctx.exceptions.clear();
        ctx.reports.push(ReportRecord {
            report_id: "r1".to_string(),
            project_id: "payments-api".to_string(),
            report_type: "pentest".to_string(),
            control_refs: vec![],
            created_at: Utc::now(),
        });
        assert_eq!(requirements_met(&ctx).status, RuleStatus::Pass);
    }
}
