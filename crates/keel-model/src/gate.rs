// gate.rs - Promotion gates and their rule definitions.
//
// A PromotionGate is the ordered rule list guarding one environment
// transition. Each rule is stored as `rule_type` plus a free-form `params`
// object so gates stay editable as plain JSON/YAML, and decoded into the
// closed `RuleKind` sum type when evaluated.
//
// Rule types this build does not know decode to `RuleKind::Unknown`; the
// evaluator skips them instead of failing the gate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::environment::{AutonomyMode, RiskLevel};
use crate::error::ModelError;
use crate::framework::Transition;

/// Whether a passing gate promotes automatically or waits for a human.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    Auto,
    #[default]
    Manual,
}

/// The rule set gating one environment transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionGate {
    pub gate_id: String,
    #[serde(default)]
    pub name: String,
    pub source_environment: String,
    pub target_environment: String,
    pub rules: Vec<GateRule>,
    #[serde(default)]
    pub approval_mode: ApprovalMode,
}

impl PromotionGate {
    pub fn transition(&self) -> Transition {
        Transition::new(&self.source_environment, &self.target_environment)
    }
}

/// One rule as configured on a gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRule {
    pub rule_id: String,
    #[serde(default)]
    pub name: String,
    pub rule_type: String,
    #[serde(default)]
    pub params: Value,
    /// Skip (not fail) this rule for projects that are not AI-enabled.
    #[serde(default)]
    pub ai_only: bool,
}

impl GateRule {
    /// Build a rule from a typed kind.
    pub fn new(rule_id: impl Into<String>, kind: RuleKind) -> Self {
        let mut params = match serde_json::to_value(&kind) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let rule_type = params
            .remove("rule_type")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            rule_id: rule_id.into(),
            name: String::new(),
            rule_type,
            params: if params.is_empty() {
                Value::Null
            } else {
                Value::Object(params)
            },
            ai_only: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn ai_only(mut self) -> Self {
        self.ai_only = true;
        self
    }

    /// Decode `rule_type` + `params` into a typed [`RuleKind`].
    ///
    /// Unknown rule types decode to [`RuleKind::Unknown`]. Known types with
    /// missing or mistyped parameters are an error.
    pub fn kind(&self) -> Result<RuleKind, ModelError> {
        let mut object = match &self.params {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(ModelError::InvalidRuleParams {
                    rule_id: self.rule_id.clone(),
                    rule_type: self.rule_type.clone(),
                    reason: format!("params must be an object, got {}", other),
                })
            }
        };
        object.insert("rule_type".to_string(), Value::String(self.rule_type.clone()));
        serde_json::from_value(Value::Object(object)).map_err(|e| ModelError::InvalidRuleParams {
            rule_id: self.rule_id.clone(),
            rule_type: self.rule_type.clone(),
            reason: e.to_string(),
        })
    }

    /// Display label: the configured name, or the rule id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.rule_id
        } else {
            &self.name
        }
    }
}

/// Broad grouping of rule kinds, used for remediation priority and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFamily {
    Documents,
    Findings,
    Evidence,
    Approvals,
    AiSecurity,
    Fairness,
    Compliance,
    Governance,
}

fn one() -> usize {
    1
}

/// Every rule type the gate evaluator understands, with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule_type", rename_all = "snake_case")]
pub enum RuleKind {
    // -- document presence --
    OrgBaselinePresent,
    AppSpecPresent,
    EnvironmentProfilePresent,
    CompiledPackagePresent,
    ReportPresent { report_type: String },

    // -- finding thresholds --
    NoSecretsDetected,
    MaxCriticalFindings {
        #[serde(default)]
        max: usize,
    },
    MaxHighFindings {
        #[serde(default)]
        max: usize,
    },
    MaxOpenFindings {
        #[serde(default)]
        max: usize,
    },
    NoFindingsInCategory { category: String },
    MaxFindingsByTool {
        tool_name: String,
        #[serde(default)]
        max: usize,
    },
    MaxCvssScore { threshold: f64 },
    NoDependencyVulnerabilities,
    NoIacMisconfigurations,

    // -- test and scan evidence --
    TestReportPresent { test_type: String },
    SbomPresent,
    ScanTargetsRegistered {
        #[serde(default = "one")]
        min: usize,
    },
    ScanTargetsPassing,
    ScanCoverage { tool_type: String },

    // -- approvals --
    ApprovalPresent { request_type: String },
    NoPendingApprovals {
        #[serde(default)]
        request_type: Option<String>,
    },
    SecurityReviewApproved,
    RaiReviewApproved,

    // -- AI security --
    NoPromptInjectionFindings,
    NoAiSecurityFindings,
    NoDataLeakageFindings,
    ModelContextRestricted,

    // -- fairness posture --
    FairnessCasePresent,
    FairnessRequirementsDefined,
    FairnessEvidenceAttested,
    FairnessEvidenceFresh {
        /// Falls back to the evaluator's configured maximum age.
        #[serde(default)]
        max_age_days: Option<i64>,
    },
    FairnessMonitoringActive,
    NoFairnessSignalBreaches,
    ContextReceiptsPresent,

    // -- framework and control compliance --
    MinComplianceScore { min_score: f64 },
    FrameworkScore { framework: String, min_score: f64 },
    FrameworkRequirementsMet,
    FrameworkControlRequired { category: String, control: String },
    #[serde(rename = "aiuc1_control_required")]
    Aiuc1ControlRequired { category: String, control: String },
    BaselineDomainAssessed { category: String },

    // -- exceptions and environment posture --
    MaxActiveExceptions {
        #[serde(default)]
        max: usize,
    },
    ExceptionsHaveCompensatingControls,
    MaxRiskLevel { max: RiskLevel },
    AutonomyModeAllowed { modes: Vec<AutonomyMode> },

    /// A rule type this build does not recognize.
    #[serde(other)]
    Unknown,
}

impl RuleKind {
    pub fn family(&self) -> RuleFamily {
        use RuleKind::*;
        match self {
            OrgBaselinePresent
            | AppSpecPresent
            | EnvironmentProfilePresent
            | CompiledPackagePresent
            | ReportPresent { .. } => RuleFamily::Documents,
            NoSecretsDetected
            | MaxCriticalFindings { .. }
            | MaxHighFindings { .. }
            | MaxOpenFindings { .. }
            | NoFindingsInCategory { .. }
            | MaxFindingsByTool { .. }
            | MaxCvssScore { .. }
            | NoDependencyVulnerabilities
            | NoIacMisconfigurations => RuleFamily::Findings,
            TestReportPresent { .. }
            | SbomPresent
            | ScanTargetsRegistered { .. }
            | ScanTargetsPassing
            | ScanCoverage { .. } => RuleFamily::Evidence,
            ApprovalPresent { .. }
            | NoPendingApprovals { .. }
            | SecurityReviewApproved
            | RaiReviewApproved => RuleFamily::Approvals,
            NoPromptInjectionFindings
            | NoAiSecurityFindings
            | NoDataLeakageFindings
            | ModelContextRestricted => RuleFamily::AiSecurity,
            FairnessCasePresent
            | FairnessRequirementsDefined
            | FairnessEvidenceAttested
            | FairnessEvidenceFresh { .. }
            | FairnessMonitoringActive
            | NoFairnessSignalBreaches
            | ContextReceiptsPresent => RuleFamily::Fairness,
            MinComplianceScore { .. }
            | FrameworkScore { .. }
            | FrameworkRequirementsMet
            | FrameworkControlRequired { .. }
            | Aiuc1ControlRequired { .. }
            | BaselineDomainAssessed { .. } => RuleFamily::Compliance,
            MaxActiveExceptions { .. }
            | ExceptionsHaveCompensatingControls
            | MaxRiskLevel { .. }
            | AutonomyModeAllowed { .. }
            | Unknown => RuleFamily::Governance,
        }
    }

    /// Guidance copied into the remediation packet when this rule fails.
    pub fn remediation_hint(&self) -> String {
        use RuleKind::*;
        match self {
            OrgBaselinePresent => "Publish an active org baseline for the project's organization.".to_string(),
            AppSpecPresent => "Author and activate an application spec describing components, trust boundaries and data.".to_string(),
            EnvironmentProfilePresent => "Create an environment profile for the target environment.".to_string(),
            CompiledPackagePresent => "Compile the project's context package after all three policy documents are active.".to_string(),
            ReportPresent { report_type } => format!("Produce and upload a '{}' report.", report_type),
            NoSecretsDetected => "Remove hardcoded secrets, rotate the exposed credentials and move them to a secret manager.".to_string(),
            MaxCriticalFindings { max } => format!("Resolve open critical findings until at most {} remain.", max),
            MaxHighFindings { max } => format!("Resolve open high-severity findings until at most {} remain.", max),
            MaxOpenFindings { max } => format!("Triage and resolve open findings until at most {} remain.", max),
            NoFindingsInCategory { category } => format!("Resolve every open finding in category '{}'.", category),
            MaxFindingsByTool { tool_name, max } => format!("Reduce open findings reported by '{}' to at most {}.", tool_name, max),
            MaxCvssScore { threshold } => format!("Patch or mitigate findings with CVSS at or above {:.1}.", threshold),
            NoDependencyVulnerabilities => "Upgrade or replace vulnerable dependencies.".to_string(),
            NoIacMisconfigurations => "Fix infrastructure-as-code misconfigurations reported by the IaC scanner.".to_string(),
            TestReportPresent { test_type } => format!("Run the '{}' test suite and upload its report.", test_type),
            SbomPresent => "Generate a software bill of materials and attach it to the project.".to_string(),
            ScanTargetsRegistered { min } => format!("Register at least {} scan target(s) for the project.", min),
            ScanTargetsPassing => "Re-run failing scan targets and fix the causes of failure.".to_string(),
            ScanCoverage { tool_type } => format!("Register a scan target using a '{}' tool.", tool_type),
            ApprovalPresent { request_type } => format!("Obtain an approved '{}' request.", request_type),
            NoPendingApprovals { .. } => "Resolve pending approval requests before promoting.".to_string(),
            SecurityReviewApproved => "Request and complete a security review.".to_string(),
            RaiReviewApproved => "Request and complete a responsible-AI review.".to_string(),
            NoPromptInjectionFindings => "Harden prompt handling and resolve prompt-injection findings.".to_string(),
            NoAiSecurityFindings => "Resolve findings reported by AI security scanners.".to_string(),
            NoDataLeakageFindings => "Stop sensitive data from reaching model inputs or outputs and resolve leakage findings.".to_string(),
            ModelContextRestricted => "List the data that must never enter model context in the application spec.".to_string(),
            FairnessCasePresent => "Open a fairness case describing the use case and protected attributes.".to_string(),
            FairnessRequirementsDefined => "Define fairness metrics and thresholds for the fairness case.".to_string(),
            FairnessEvidenceAttested => "Collect fairness evidence and have it attested.".to_string(),
            FairnessEvidenceFresh { max_age_days: Some(days) } => format!("Refresh fairness evidence so it is younger than {} days.", days),
            FairnessEvidenceFresh { max_age_days: None } => "Collect fresh fairness evidence.".to_string(),
            FairnessMonitoringActive => "Enable fairness monitoring signals for the deployed model.".to_string(),
            NoFairnessSignalBreaches => "Investigate and remediate breached fairness monitoring signals.".to_string(),
            ContextReceiptsPresent => "Record context receipts showing which policy package agents used.".to_string(),
            MinComplianceScore { min_score } => format!("Raise the compliance score to at least {:.1}.", min_score),
            FrameworkScore { framework, min_score } => format!("Raise the '{}' compliance score to at least {:.1}.", framework, min_score),
            FrameworkRequirementsMet => "Provide evidence for every mandatory framework control on this transition.".to_string(),
            FrameworkControlRequired { category, control } | Aiuc1ControlRequired { category, control } => {
                format!("Enable control '{}.{}' in the org baseline or record an exception.", category, control)
            }
            BaselineDomainAssessed { category } => format!("Assess every control in the '{}' domain of the org baseline.", category),
            MaxActiveExceptions { max } => format!("Close or let expire active exceptions until at most {} remain.", max),
            ExceptionsHaveCompensatingControls => "Document compensating controls for every active exception.".to_string(),
            MaxRiskLevel { max } => format!("Lower the environment risk level to '{}' or below.", max),
            AutonomyModeAllowed { .. } => "Change the environment's autonomy mode to one the gate allows.".to_string(),
            Unknown => "Update the gate definition or upgrade the evaluator to support this rule type.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_rule_round_trips_through_params() {
        let rule = GateRule::new(
            "r-aiuc",
            RuleKind::Aiuc1ControlRequired {
                category: "safety".to_string(),
                control: "human_oversight".to_string(),
            },
        );
        assert_eq!(rule.rule_type, "aiuc1_control_required");
        assert_eq!(rule.params["control"], "human_oversight");
        assert_eq!(
            rule.kind().unwrap(),
            RuleKind::Aiuc1ControlRequired {
                category: "safety".to_string(),
                control: "human_oversight".to_string(),
            }
        );
    }

    #[test]
    fn unit_rule_has_null_params() {
        let rule = GateRule::new("r1", RuleKind::NoSecretsDetected);
        assert_eq!(rule.rule_type, "no_secrets_detected");
        assert!(rule.params.is_null());
        assert_eq!(rule.kind().unwrap(), RuleKind::NoSecretsDetected);
    }

    #[test]
    fn unknown_rule_type_decodes_to_unknown() {
        let rule: GateRule = serde_json::from_value(json!({
            "rule_id": "r9",
            "rule_type": "quantum_readiness",
            "params": {"qubits": 4}
        }))
        .unwrap();
        assert_eq!(rule.kind().unwrap(), RuleKind::Unknown);
    }

    #[test]
    fn missing_params_for_known_type_is_error() {
        let rule: GateRule = serde_json::from_value(json!({
            "rule_id": "r2",
            "rule_type": "framework_control_required",
            "params": {"category": "security"}
        }))
        .unwrap();
        match rule.kind() {
            Err(ModelError::InvalidRuleParams { rule_id, .. }) => assert_eq!(rule_id, "r2"),
            other => panic!("expected InvalidRuleParams, got {:?}", other),
        }
    }

    #[test]
    fn defaults_apply_to_optional_params() {
        let rule: GateRule = serde_json::from_value(json!({
            "rule_id": "r3",
            "rule_type": "scan_targets_registered"
        }))
        .unwrap();
        assert_eq!(rule.kind().unwrap(), RuleKind::ScanTargetsRegistered { min: 1 });
    }

    #[test]
    fn gate_yaml_parsing() {
        let yaml = r#"
gate_id: "dev-to-preprod"
source_environment: "dev"
target_environment: "preprod"
approval_mode: auto
rules:
  - rule_id: "secrets"
    rule_type: "no_secrets_detected"
  - rule_id: "risk"
    rule_type: "max_risk_level"
    params: { max: medium }
  - rule_id: "rai"
    rule_type: "rai_review_approved"
    ai_only: true
"#;
        let gate: PromotionGate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(gate.transition().to_string(), "dev->preprod");
        assert_eq!(gate.approval_mode, ApprovalMode::Auto);
        assert_eq!(
            gate.rules[1].kind().unwrap(),
            RuleKind::MaxRiskLevel { max: RiskLevel::Medium }
        );
        assert!(gate.rules[2].ai_only);
    }
}
