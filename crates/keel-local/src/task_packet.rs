// task_packet.rs - Task-scoped policy views for a single development task.
//
// A scoped packet is what an agent is handed before it starts work: the
// slice of the compiled package that matters for this kind of task, plus
// the reassessment triggers its change hints touch. It is a read-only
// projection; nothing in it is enforced here.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use keel_model::{CompiledContextPackage, RequiredTests};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ContextBudget;
use crate::error::LocalPolicyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Feature,
    Bugfix,
    Refactor,
    Security,
    Infrastructure,
    AiModel,
    Documentation,
    Test,
}

/// Which `required_tests` groups apply to a task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TestGroups {
    security: bool,
    rai: bool,
    functional: bool,
}

impl TaskType {
    pub const ALL: [TaskType; 8] = [
        TaskType::Feature,
        TaskType::Bugfix,
        TaskType::Refactor,
        TaskType::Security,
        TaskType::Infrastructure,
        TaskType::AiModel,
        TaskType::Documentation,
        TaskType::Test,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Feature => "feature",
            TaskType::Bugfix => "bugfix",
            TaskType::Refactor => "refactor",
            TaskType::Security => "security",
            TaskType::Infrastructure => "infrastructure",
            TaskType::AiModel => "ai_model",
            TaskType::Documentation => "documentation",
            TaskType::Test => "test",
        }
    }

    fn test_groups(self) -> TestGroups {
        let (security, rai, functional) = match self {
            TaskType::Feature => (true, false, true),
            TaskType::Bugfix | TaskType::Refactor | TaskType::Test => (false, false, true),
            TaskType::Security | TaskType::Infrastructure => (true, false, true),
            TaskType::AiModel => (true, true, true),
            TaskType::Documentation => (false, false, false),
        };
        TestGroups {
            security,
            rai,
            functional,
        }
    }

    /// The subset of `tests` this task type must run.
    pub fn required_tests(self, tests: &RequiredTests) -> RequiredTests {
        let groups = self.test_groups();
        let pick = |enabled: bool, names: &Vec<String>| {
            if enabled {
                names.clone()
            } else {
                Vec::new()
            }
        };
        RequiredTests {
            security: pick(groups.security, &tests.security),
            rai: pick(groups.rai, &tests.rai),
            functional: pick(groups.functional, &tests.functional),
        }
    }

    /// Keywords an allowed action must contain to be in scope. `None`
    /// leaves every allowed action in scope.
    pub fn action_scope(self) -> Option<&'static [&'static str]> {
        match self {
            TaskType::Documentation => Some(&["read", "search", "write_file", "docs"]),
            TaskType::Test => Some(&["read", "search", "write_file", "test"]),
            TaskType::Bugfix | TaskType::Refactor => {
                Some(&["read", "search", "write_file", "test", "lint", "format"])
            }
            TaskType::Feature
            | TaskType::Security
            | TaskType::Infrastructure
            | TaskType::AiModel => None,
        }
    }

    pub fn in_scope(self, action: &str) -> bool {
        match self.action_scope() {
            Some(keywords) => keywords.iter().any(|k| action.contains(k)),
            None => true,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = LocalPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| LocalPolicyError::UnknownTaskType {
                value: s.to_string(),
            })
    }
}

/// What the agent is about to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_type: TaskType,
    pub summary: String,
    #[serde(default)]
    pub affected_components: Vec<String>,
    /// Free-form descriptions of the change, e.g. `"auth_flow"` or
    /// `"network policy change"`.
    #[serde(default)]
    pub change_hints: Vec<String>,
    /// Overrides the generator's default budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_budget: Option<ContextBudget>,
}

impl TaskRequest {
    pub fn new(task_type: TaskType, summary: impl Into<String>) -> Self {
        Self {
            task_type,
            summary: summary.into(),
            affected_components: Vec::new(),
            change_hints: Vec::new(),
            context_budget: None,
        }
    }

    pub fn with_components(mut self, components: Vec<String>) -> Self {
        self.affected_components = components;
        self
    }

    pub fn with_hints(mut self, hints: Vec<String>) -> Self {
        self.change_hints = hints;
        self
    }

    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.context_budget = Some(budget);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedTaskPacket {
    pub packet_id: Uuid,
    pub project_id: String,
    pub package_id: Uuid,
    /// Integrity hash of the package this view was cut from.
    pub package_hash: String,
    pub environment: String,
    pub task_type: TaskType,
    pub summary: String,
    #[serde(default)]
    pub affected_components: Vec<String>,
    pub allowed_actions: Vec<String>,
    pub blocked_actions: Vec<String>,
    pub approval_required_for: Vec<String>,
    pub required_tests: RequiredTests,
    /// Reassessment triggers touched by the request's change hints.
    #[serde(default)]
    pub approval_triggers: Vec<String>,
    #[serde(default)]
    pub prohibited_in_model_context: Vec<String>,
    pub context_budget: ContextBudget,
    pub generated_at: DateTime<Utc>,
}

impl ScopedTaskPacket {
    /// The change needs a human decision before it lands.
    pub fn needs_approval(&self) -> bool {
        !self.approval_triggers.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskPacketGenerator {
    default_budget: ContextBudget,
}

impl TaskPacketGenerator {
    pub fn new(default_budget: ContextBudget) -> Self {
        Self { default_budget }
    }

    /// Cut a task-scoped view out of `package`. The caller is responsible
    /// for having verified the package.
    pub fn generate(
        &self,
        package: &CompiledContextPackage,
        request: &TaskRequest,
    ) -> ScopedTaskPacket {
        let task_type = request.task_type;
        let policy = &package.autonomy_policy;
        let allowed_actions = policy
            .allowed_actions
            .iter()
            .filter(|a| task_type.in_scope(a))
            .cloned()
            .collect();

        let packet = ScopedTaskPacket {
            packet_id: Uuid::new_v4(),
            project_id: package.project_id().to_string(),
            package_id: package.package_id(),
            package_hash: package.integrity().hash.clone(),
            environment: package.project_identity.environment.clone(),
            task_type,
            summary: request.summary.clone(),
            affected_components: request.affected_components.clone(),
            allowed_actions,
            blocked_actions: policy.blocked_actions.clone(),
            approval_required_for: policy.approval_required_for.clone(),
            required_tests: task_type.required_tests(&package.required_tests),
            approval_triggers: approval_triggers(
                &package.change_reassessment_triggers,
                &request.change_hints,
            ),
            prohibited_in_model_context: package
                .rai_requirements
                .as_ref()
                .map(|r| r.prohibited_in_model_context.clone())
                .unwrap_or_default(),
            context_budget: request.context_budget.unwrap_or(self.default_budget),
            generated_at: Utc::now(),
        };

        tracing::debug!(
            project_id = %packet.project_id,
            task_type = %task_type,
            triggers = packet.approval_triggers.len(),
            "generated task packet"
        );
        packet
    }
}

/// Triggers matched by a hint, in package order. A hint matches a trigger
/// when it names it outright (`auth_flow_change`) or names its subject
/// (`auth flow`).
pub fn approval_triggers(triggers: &[String], hints: &[String]) -> Vec<String> {
    let hints: Vec<String> = hints.iter().map(|h| normalize(h)).collect();
    triggers
        .iter()
        .filter(|trigger| {
            hints
                .iter()
                .any(|h| h == *trigger || format!("{}_change", h) == **trigger)
        })
        .cloned()
        .collect()
}

fn normalize(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::package;

    #[test]
    fn task_type_parses_loosely() {
        assert_eq!("AI-Model".parse::<TaskType>().unwrap(), TaskType::AiModel);
        assert_eq!(" bugfix ".parse::<TaskType>().unwrap(), TaskType::Bugfix);
        assert!(matches!(
            "chore".parse::<TaskType>(),
            Err(LocalPolicyError::UnknownTaskType { .. })
        ));
    }

    #[test]
    fn required_tests_follow_task_type() {
        let tests = package().required_tests;
        let docs = TaskType::Documentation.required_tests(&tests);
        assert_eq!(docs, RequiredTests::default());

        let bugfix = TaskType::Bugfix.required_tests(&tests);
        assert!(bugfix.security.is_empty());
        assert_eq!(bugfix.functional, tests.functional);

        let model = TaskType::AiModel.required_tests(&tests);
        assert_eq!(model, tests);
    }

    #[test]
    fn hints_select_reassessment_triggers() {
        let triggers = vec![
            "auth_flow_change".to_string(),
            "network_policy_change".to_string(),
            "model_change".to_string(),
        ];
        let hints = vec![
            "Auth flow".to_string(),
            "model_change".to_string(),
            "new logging".to_string(),
        ];
        assert_eq!(
            approval_triggers(&triggers, &hints),
            vec!["auth_flow_change", "model_change"]
        );
        assert!(approval_triggers(&triggers, &[]).is_empty());
    }

    #[test]
    fn packet_is_scoped_to_task() {
        let package = package();
        let request = TaskRequest::new(TaskType::Documentation, "Document the refund API")
            .with_components(vec!["api".to_string()])
            .with_hints(vec!["auth_flow_change".to_string()]);
        let packet = TaskPacketGenerator::default().generate(&package, &request);

        assert_eq!(packet.project_id, "payments-api");
        assert_eq!(packet.package_hash, package.integrity().hash);
        assert_eq!(packet.allowed_actions, vec!["read_file", "write_file"]);
        assert_eq!(packet.blocked_actions, package.autonomy_policy.blocked_actions);
        assert_eq!(packet.approval_triggers, vec!["auth_flow_change"]);
        assert!(packet.needs_approval());
        assert_eq!(packet.context_budget, ContextBudget::default());
        assert_eq!(packet.prohibited_in_model_context, vec!["customer_pii"]);
    }

    #[test]
    fn budget_override_is_carried_verbatim() {
        let budget = ContextBudget {
            max_tokens: 1200,
            max_files: Some(3),
        };
        let request = TaskRequest::new(TaskType::Feature, "Add refunds").with_budget(budget);
        let packet = TaskPacketGenerator::default().generate(&package(), &request);
        assert_eq!(packet.context_budget, budget);
        assert!(packet.allowed_actions.contains(&"run_migration".to_string()));
        assert!(!packet.needs_approval());
    }
}
