// fairness.rs - Fairness posture of AI use cases.

use chrono::Duration;
use serde_json::json;

use super::{RuleError, RuleOutcome};
use crate::context::EvaluationContext;

pub(super) fn case_present(ctx: &EvaluationContext) -> RuleOutcome {
    match &ctx.fairness.case {
        Some(case) => RuleOutcome::pass(format!("fairness case {} open for '{}'", case.case_id, case.use_case)),
        None => RuleOutcome::fail("no fairness case"),
    }
}

pub(super) fn requirements_defined(ctx: &EvaluationContext) -> RuleOutcome {
    match &ctx.fairness.requirements {
        Some(r) if !r.metrics.is_empty() => {
            RuleOutcome::pass(format!("{} fairness metric(s) defined", r.metrics.len()))
        }
        Some(_) => RuleOutcome::fail("fairness requirements define no metrics"),
        None => RuleOutcome::fail("no fairness requirements"),
    }
}

pub(super) fn evidence_attested(ctx: &EvaluationContext) -> RuleOutcome {
    let now = ctx.evaluated_at;
    let attested = ctx
        .fairness
        .evidence
        .iter()
        .filter(|e| e.is_attested() && !e.is_expired_at(now))
        .count();
    RuleOutcome::check(
        attested > 0,
        format!("{} attested fairness evidence package(s)", attested),
        "no attested, unexpired fairness evidence",
    )
}

/// Attested evidence collected within the age limit.
pub(super) fn evidence_fresh(
    ctx: &EvaluationContext,
    max_age_days: Option<i64>,
) -> Result<RuleOutcome, RuleError> {
    let days = max_age_days.unwrap_or(ctx.fairness_max_age_days);
    if days <= 0 {
        return Err(RuleError(format!("max_age_days must be positive, got {}", days)));
    }
    let now = ctx.evaluated_at;
    let cutoff = Duration::try_days(days)
        .and_then(|age| now.checked_sub_signed(age))
        .ok_or_else(|| RuleError(format!("max_age_days {} is out of range", days)))?;
    let newest = ctx
        .fairness
        .evidence
        .iter()
        .filter(|e| e.is_attested() && !e.is_expired_at(now))
        .map(|e| e.collected_at)
        .max();
    Ok(match newest {
        Some(at) if at >= cutoff => {
            RuleOutcome::pass(format!("fairness evidence collected {} day(s) ago", (now - at).num_days()))
        }
        Some(at) => RuleOutcome::fail(format!(
            "newest fairness evidence is {} day(s) old, limit {}",
            (now - at).num_days(),
            days
        )),
        None => RuleOutcome::fail("no attested fairness evidence"),
    }
    .with_details(json!({ "max_age_days": days })))
}

pub(super) fn monitoring_active(ctx: &EvaluationContext) -> RuleOutcome {
    let signals = ctx.fairness.signals.len();
    RuleOutcome::check(
        signals > 0,
        format!("{} fairness monitoring signal(s) recorded", signals),
        "no fairness monitoring signals",
    )
}

pub(super) fn no_signal_breaches(ctx: &EvaluationContext) -> RuleOutcome {
    let breached: Vec<&str> = ctx
        .fairness
        .signals
        .iter()
        .filter(|s| s.breached)
        .map(|s| s.metric.as_str())
        .collect();
    if breached.is_empty() {
        RuleOutcome::pass("no fairness threshold breaches")
    } else {
        RuleOutcome::fail(format!("fairness thresholds breached: {}", breached.join(", ")))
            .with_details(json!({ "metrics": breached }))
    }
}

/// With a compiled package, a receipt must reference its current hash.
pub(super) fn context_receipts_present(ctx: &EvaluationContext) -> RuleOutcome {
    let receipts = &ctx.fairness.receipts;
    match &ctx.package {
        Some(package) => {
            let hash = &package.integrity().hash;
            RuleOutcome::check(
                receipts.iter().any(|r| &r.package_hash == hash),
                format!("context receipt recorded for package revision {}", package.revision()),
                format!("no context receipt for package revision {}", package.revision()),
            )
        }
        None => RuleOutcome::check(
            !receipts.is_empty(),
            format!("{} context receipt(s) recorded", receipts.len()),
            "no context receipts",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::testing::context;
    use keel_model::{AttestationStatus, EvidencePackage, RuleStatus};

    fn evidence(age_days: i64, status: AttestationStatus) -> EvidencePackage {
        EvidencePackage {
            evidence_id: format!("ev-{}", age_days),
            project_id: "payments-api".to_string(),
            attestation_status: status,
            collected_at: chrono::Utc::now() - Duration::days(age_days),
            expires_at: None,
        }
    }

    #[test]
    fn freshness_uses_rule_limit_then_default() {
        let mut ctx = context();
        ctx.fairness.evidence = vec![evidence(40, AttestationStatus::Attested)];

        assert_eq!(evidence_fresh(&ctx, Some(30)).unwrap().status, RuleStatus::Fail);
        assert_eq!(evidence_fresh(&ctx, None).unwrap().status, RuleStatus::Pass);
        ctx.fairness_max_age_days = 10;
        assert_eq!(evidence_fresh(&ctx, None).unwrap().status, RuleStatus::Fail);
        assert!(evidence_fresh(&ctx, Some(0)).is_err());
    }

    #[test]
    fn huge_age_limit_is_a_rule_error() {
        let mut ctx = context();
        ctx.fairness.evidence = vec![evidence(1, AttestationStatus::Attested)];
        assert!(evidence_fresh(&ctx, Some(1_000_000_000)).is_err());
        assert!(evidence_fresh(&ctx, Some(i64::MAX)).is_err());

        ctx.fairness_max_age_days = 1_000_000_000;
        assert!(evidence_fresh(&ctx, None).is_err());
    }

    #[test]
    fn unattested_evidence_does_not_count() {
        let mut ctx = context();
        ctx.fairness.evidence = vec![evidence(1, AttestationStatus::Unattested)];
        assert_eq!(evidence_attested(&ctx).status, RuleStatus::Fail);
        assert_eq!(evidence_fresh(&ctx, None).unwrap().status, RuleStatus::Fail);
        assert_eq!(case_present(&ctx).status, RuleStatus::Fail);
        assert_eq!(monitoring_active(&ctx).status, RuleStatus::Fail);
        assert_eq!(no_signal_breaches(&ctx).status, RuleStatus::Pass);
    }
}
