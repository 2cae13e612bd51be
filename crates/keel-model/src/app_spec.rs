// app_spec.rs - Application architecture specification.
//
// Describes the system for policy purposes: what components exist, where
// the trust boundaries run, what data is handled, and what must never be
// placed in a model's context window.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::overrides::PolicyOverrides;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    pub spec_id: String,
    pub project_id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Declared AI usage. Components of kind `model` or `agent` also make
    /// the application AI-enabled.
    #[serde(default)]
    pub ai_enabled: bool,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub trust_boundaries: Vec<TrustBoundary>,
    #[serde(default)]
    pub data_classifications: Vec<DataClassification>,
    /// Data or artifacts that must never enter a model's context
    /// (e.g. "customer_pii", "production_credentials").
    #[serde(default)]
    pub prohibited_in_model_context: Vec<String>,
    #[serde(default)]
    pub policy_overrides: PolicyOverrides,
    /// Control overrides keyed by dotted path (`"safety.human_oversight"`).
    #[serde(default)]
    pub control_overrides: BTreeMap<String, bool>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    /// Names of data classifications this component handles.
    #[serde(default)]
    pub handles: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Service,
    Frontend,
    Datastore,
    Model,
    Agent,
    Integration,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustBoundary {
    pub name: String,
    /// Components on either side of the boundary.
    pub components: Vec<String>,
    #[serde(default)]
    pub required_controls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataClassification {
    pub name: String,
    pub sensitivity: Sensitivity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Public,
    Internal,
    Confidential,
    Restricted,
}

impl ApplicationSpec {
    pub fn is_ai_enabled(&self) -> bool {
        self.ai_enabled
            || self
                .components
                .iter()
                .any(|c| matches!(c.kind, ComponentKind::Model | ComponentKind::Agent))
    }

    /// Reject references to components that are not declared in `components`.
    pub fn validate(&self) -> Result<(), ModelError> {
        for boundary in &self.trust_boundaries {
            for name in &boundary.components {
                if !self.components.iter().any(|c| &c.name == name) {
                    return Err(ModelError::Malformed {
                        document: "application_spec".to_string(),
                        reason: format!(
                            "trust boundary '{}' references undeclared component '{}'",
                            boundary.name, name
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ModelError> {
        serde_yaml::from_str(yaml).map_err(|e| ModelError::Malformed {
            document: "application_spec".to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_with(components: Vec<Component>) -> ApplicationSpec {
        ApplicationSpec {
            spec_id: "spec-1".to_string(),
            project_id: "p".to_string(),
            version: 1,
            ai_enabled: false,
            components,
            trust_boundaries: vec![],
            data_classifications: vec![],
            prohibited_in_model_context: vec![],
            policy_overrides: PolicyOverrides::default(),
            control_overrides: BTreeMap::new(),
        }
    }

    #[test]
    fn model_component_makes_spec_ai_enabled() {
        let plain = spec_with(vec![Component {
            name: "api".to_string(),
            kind: ComponentKind::Service,
            handles: vec![],
        }]);
        assert!(!plain.is_ai_enabled());

        let with_model = spec_with(vec![Component {
            name: "ranker".to_string(),
            kind: ComponentKind::Model,
            handles: vec![],
        }]);
        assert!(with_model.is_ai_enabled());
    }

    #[test]
    fn unknown_component_kind_parses_as_other() {
        let component: Component =
            serde_json::from_str(r#"{"name": "q", "kind": "message_queue"}"#).unwrap();
        assert_eq!(component.kind, ComponentKind::Other);
    }

    #[test]
    fn boundary_with_undeclared_component_is_rejected() {
        let mut spec = spec_with(vec![]);
        spec.trust_boundaries.push(TrustBoundary {
            name: "internet".to_string(),
            components: vec!["gateway".to_string()],
            required_controls: vec![],
        });
        assert!(matches!(spec.validate(), Err(ModelError::Malformed { .. })));
    }
}
