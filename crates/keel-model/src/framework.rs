// framework.rs - Projects, business units and framework control requirements.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A governed project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub business_unit_id: Option<String>,
    #[serde(default)]
    pub ai_enabled: bool,
    /// The environment the project currently runs in.
    pub current_environment: String,
}

/// A business unit and the compliance frameworks it has selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessUnit {
    pub business_unit_id: String,
    pub org_id: String,
    pub name: String,
    #[serde(default)]
    pub framework_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementLevel {
    Mandatory,
    Recommended,
}

impl fmt::Display for RequirementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementLevel::Mandatory => write!(f, "mandatory"),
            RequirementLevel::Recommended => write!(f, "recommended"),
        }
    }
}

/// One control obligation derived from a compliance framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkRequirement {
    pub framework_id: String,
    pub control_id: String,
    #[serde(default)]
    pub title: String,
    /// `"source->target"` strings, or `"*"` for every transition.
    pub applies_to_transitions: Vec<String>,
    pub requirement_level: RequirementLevel,
    /// What satisfies the requirement: a report type such as "pentest",
    /// "dpia" or "model_card".
    pub evidence_type: String,
}

impl FrameworkRequirement {
    pub fn applies_to(&self, transition: &Transition) -> bool {
        let key = transition.to_string();
        self.applies_to_transitions
            .iter()
            .map(|t| t.trim())
            .any(|t| t == "*" || t == key)
    }

    pub fn is_mandatory(&self) -> bool {
        self.requirement_level == RequirementLevel::Mandatory
    }
}

/// An environment-to-environment promotion, written `source->target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    pub source: String,
    pub target: String,
}

impl Transition {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}

impl FromStr for Transition {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once("->") {
            Some((source, target)) if !source.trim().is_empty() && !target.trim().is_empty() => {
                Ok(Transition::new(source.trim(), target.trim()))
            }
            _ => Err(ModelError::InvalidTransition {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement(transitions: &[&str]) -> FrameworkRequirement {
        FrameworkRequirement {
            framework_id: "nist-ai-rmf".to_string(),
            control_id: "MAP-1.1".to_string(),
            title: String::new(),
            applies_to_transitions: transitions.iter().map(|t| t.to_string()).collect(),
            requirement_level: RequirementLevel::Mandatory,
            evidence_type: "impact_assessment".to_string(),
        }
    }

    #[test]
    fn exact_transition_matches_only_itself() {
        let req = requirement(&["sandbox->dev"]);
        assert!(req.applies_to(&Transition::new("sandbox", "dev")));
        assert!(!req.applies_to(&Transition::new("dev", "preprod")));
    }

    #[test]
    fn wildcard_matches_every_transition() {
        let req = requirement(&["*"]);
        assert!(req.applies_to(&Transition::new("preprod", "prod")));
    }

    #[test]
    fn transition_parsing() {
        let t: Transition = "dev->preprod".parse().unwrap();
        assert_eq!(t, Transition::new("dev", "preprod"));
        assert_eq!(t.to_string(), "dev->preprod");
        assert!("dev".parse::<Transition>().is_err());
        assert!("->prod".parse::<Transition>().is_err());
    }
}
