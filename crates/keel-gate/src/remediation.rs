// remediation.rs - Task packets for failing gate rules.
//
// Builds the packet for one failure; storing it is the job of
// `TaskPacketStore::create_if_absent`, which guarantees at most one open
// packet per (project, rule).

use chrono::{DateTime, Utc};
use keel_model::{
    CompiledContextPackage, GateRule, PromotionGate, RuleEvaluationResult, RuleFamily, RuleKind,
    TaskPacket, TaskPriority, TaskStatus,
};
use uuid::Uuid;

use crate::config::RemediationConfig;

/// Priority of a failing rule: exposed secrets first, then findings.
pub fn priority_for(kind: Option<&RuleKind>, default: TaskPriority) -> TaskPriority {
    match kind {
        Some(RuleKind::NoSecretsDetected) => TaskPriority::Critical,
        Some(k) if matches!(k.family(), RuleFamily::Findings | RuleFamily::AiSecurity) => {
            TaskPriority::High.max(default)
        }
        _ => default,
    }
}

pub struct RemediationPlanner<'a> {
    config: &'a RemediationConfig,
    package: Option<&'a CompiledContextPackage>,
}

impl<'a> RemediationPlanner<'a> {
    pub fn new(config: &'a RemediationConfig, package: Option<&'a CompiledContextPackage>) -> Self {
        Self { config, package }
    }

    /// The packet to open for a failed rule.
    pub fn packet(
        &self,
        project_id: &str,
        gate: &PromotionGate,
        rule: &GateRule,
        result: &RuleEvaluationResult,
        now: DateTime<Utc>,
    ) -> TaskPacket {
        let kind = rule.kind().ok();
        let fix_guidance = match &kind {
            Some(RuleKind::Unknown) | None => format!(
                "Fix the '{}' rule configuration or the condition it reports.",
                rule.rule_type
            ),
            Some(k) => k.remediation_hint(),
        };
        let human_only = self
            .package
            .is_some_and(|p| !p.remediation_eligibility.allows(&rule.rule_type));

        TaskPacket {
            packet_id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            gate_id: gate.gate_id.clone(),
            rule_id: rule.rule_id.clone(),
            rule_type: rule.rule_type.clone(),
            transition: gate.transition(),
            title: format!("Fix: {}", rule.label()),
            failure_message: result.message.clone(),
            fix_guidance,
            priority: priority_for(kind.as_ref(), self.config.default_priority),
            human_only,
            status: TaskStatus::Pending,
            claimed_by: None,
            claimed_at: None,
            outcome: None,
            created_at: now,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_model::{ApprovalMode, RuleStatus};

    fn gate(rule: GateRule) -> PromotionGate {
        PromotionGate {
            gate_id: "dev-to-preprod".to_string(),
            name: String::new(),
            source_environment: "dev".to_string(),
            target_environment: "preprod".to_string(),
            rules: vec![rule],
            approval_mode: ApprovalMode::Manual,
        }
    }

    fn failed(rule: &GateRule) -> RuleEvaluationResult {
        RuleEvaluationResult {
            rule_id: rule.rule_id.clone(),
            rule_type: rule.rule_type.clone(),
            status: RuleStatus::Fail,
            message: "2 open secret finding(s)".to_string(),
            details: serde_json::Value::Null,
        }
    }

    #[test]
    fn secrets_packet_is_critical_with_guidance() {
        let rule = GateRule::new("no-secrets", RuleKind::NoSecretsDetected).named("No secrets");
        let config = RemediationConfig::default();
        let packet = RemediationPlanner::new(&config, None).packet(
            "payments-api",
            &gate(rule.clone()),
            &rule,
            &failed(&rule),
            Utc::now(),
        );
        assert_eq!(packet.title, "Fix: No secrets");
        assert_eq!(packet.priority, TaskPriority::Critical);
        assert_eq!(packet.status, TaskStatus::Pending);
        assert!(packet.fix_guidance.contains("secret manager"));
        assert_eq!(packet.transition.to_string(), "dev->preprod");
        assert!(!packet.human_only);
    }

    #[test]
    fn priority_by_family() {
        let default = TaskPriority::Low;
        assert_eq!(
            priority_for(Some(&RuleKind::MaxHighFindings { max: 0 }), default),
            TaskPriority::High
        );
        assert_eq!(priority_for(Some(&RuleKind::SbomPresent), default), TaskPriority::Low);
        assert_eq!(priority_for(None, TaskPriority::Medium), TaskPriority::Medium);
    }
}
