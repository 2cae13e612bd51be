// escalation.rs - Approval checkpoints escalated by approval level.
//
// Roles accumulate up a fixed ladder: an environment at `high` needs every
// role `standard` needs, plus more. Required-role counts therefore never
// decrease as the level rises, and `strict` adds an executive sponsor to
// every checkpoint.

use keel_model::{ApprovalCheckpoint, ApprovalLevel};

pub const EXECUTIVE_SPONSOR: &str = "executive_sponsor";

/// (level at which the role joins, role)
const ROLE_LADDER: [(ApprovalLevel, &str); 5] = [
    (ApprovalLevel::Minimal, "tech_lead"),
    (ApprovalLevel::Standard, "code_owner"),
    (ApprovalLevel::Elevated, "security_reviewer"),
    (ApprovalLevel::High, "risk_officer"),
    (ApprovalLevel::Strict, EXECUTIVE_SPONSOR),
];

/// Checkpoint-specific roles, required at every level.
fn specialist(checkpoint: &str) -> Option<&'static str> {
    match checkpoint {
        "policy_change" => Some("governance_lead"),
        "model_release" => Some("rai_reviewer"),
        _ => None,
    }
}

/// Build the approval checkpoints for an environment.
pub fn approval_checkpoints(level: ApprovalLevel, ai_enabled: bool) -> Vec<ApprovalCheckpoint> {
    let mut names = vec!["code_merge", "deployment", "policy_change"];
    if ai_enabled {
        names.push("model_release");
    }

    names
        .into_iter()
        .map(|checkpoint| {
            let mut roles: Vec<String> = specialist(checkpoint)
                .into_iter()
                .map(str::to_string)
                .collect();
            roles.extend(
                ROLE_LADDER
                    .iter()
                    .filter(|(joins_at, _)| *joins_at <= level)
                    .map(|(_, role)| role.to_string()),
            );
            ApprovalCheckpoint {
                checkpoint: checkpoint.to_string(),
                required_roles: roles,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role_count(level: ApprovalLevel) -> usize {
        approval_checkpoints(level, true)
            .iter()
            .map(|c| c.required_roles.len())
            .sum()
    }

    #[test]
    fn role_counts_never_decrease() {
        let counts: Vec<usize> = ApprovalLevel::ALL.iter().map(|l| role_count(*l)).collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{:?}", counts);
    }

    #[test]
    fn only_strict_requires_executive_sponsor() {
        for level in ApprovalLevel::ALL {
            let has_sponsor = approval_checkpoints(level, false)
                .iter()
                .all(|c| c.required_roles.iter().any(|r| r == EXECUTIVE_SPONSOR));
            assert_eq!(has_sponsor, level == ApprovalLevel::Strict, "{}", level);
        }
    }

    #[test]
    fn model_release_checkpoint_only_for_ai() {
        let names = |ai| {
            approval_checkpoints(ApprovalLevel::Standard, ai)
                .into_iter()
                .map(|c| c.checkpoint)
                .collect::<Vec<_>>()
        };
        assert!(!names(false).contains(&"model_release".to_string()));
        assert!(names(true).contains(&"model_release".to_string()));
    }
}
