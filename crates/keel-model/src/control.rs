// control.rs - Three-valued AIUC-1 controls grouped into six domains.
//
// A control is `true`, `false`, or unset. Unset means "not assessed" and
// is never the same as `false`: a gate rule requiring a control fails only
// on an explicit `false`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// The value of one named sub-control.
///
/// Serializes as JSON `true`, `false` or `null`, so baselines stay readable:
/// ```json
/// { "security": { "mfa_enforced": true, "pentest_annual": null } }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Control {
    /// Explicitly enabled.
    Enabled,
    /// Explicitly disabled.
    Disabled,
    /// Not assessed.
    #[default]
    Unset,
}

impl Control {
    pub fn is_enabled(self) -> bool {
        self == Control::Enabled
    }

    pub fn is_set(self) -> bool {
        self != Control::Unset
    }
}

impl From<Option<bool>> for Control {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Control::Enabled,
            Some(false) => Control::Disabled,
            None => Control::Unset,
        }
    }
}

impl From<Control> for Option<bool> {
    fn from(control: Control) -> Self {
        match control {
            Control::Enabled => Some(true),
            Control::Disabled => Some(false),
            Control::Unset => None,
        }
    }
}

impl From<bool> for Control {
    fn from(value: bool) -> Self {
        Some(value).into()
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Enabled => write!(f, "true"),
            Control::Disabled => write!(f, "false"),
            Control::Unset => write!(f, "unset"),
        }
    }
}

/// The six AIUC-1 control domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlDomain {
    DataPrivacy,
    Security,
    Safety,
    Reliability,
    Accountability,
    Society,
}

impl ControlDomain {
    pub const ALL: [ControlDomain; 6] = [
        ControlDomain::DataPrivacy,
        ControlDomain::Security,
        ControlDomain::Safety,
        ControlDomain::Reliability,
        ControlDomain::Accountability,
        ControlDomain::Society,
    ];

    /// The key used for this domain in serialized baselines.
    pub fn as_str(self) -> &'static str {
        match self {
            ControlDomain::DataPrivacy => "data_privacy",
            ControlDomain::Security => "security",
            ControlDomain::Safety => "safety",
            ControlDomain::Reliability => "reliability",
            ControlDomain::Accountability => "accountability",
            ControlDomain::Society => "society",
        }
    }
}

impl fmt::Display for ControlDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlDomain {
    type Err = ();

    /// Accepts `data_privacy`, `data-privacy` and any casing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ControlDomain::ALL
            .into_iter()
            .find(|d| d.as_str() == normalized)
            .ok_or(())
    }
}

/// A parsed `domain.control` reference, e.g. `security.mfa_enforced`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPath {
    pub domain: ControlDomain,
    pub control: String,
}

impl ControlPath {
    pub fn parse(path: &str) -> Result<Self, ModelError> {
        let (domain, control) = path
            .split_once('.')
            .filter(|(d, c)| !d.trim().is_empty() && !c.trim().is_empty())
            .ok_or_else(|| ModelError::InvalidControlPath {
                path: path.to_string(),
            })?;
        Self::new(domain, control).map_err(|_| ModelError::UnknownControlDomain {
            domain: domain.to_string(),
            path: path.to_string(),
        })
    }

    /// Build a path from a category and control name, as gate rules carry them.
    pub fn new(category: &str, control: &str) -> Result<Self, ModelError> {
        let domain = category
            .parse::<ControlDomain>()
            .map_err(|_| ModelError::UnknownControlDomain {
                domain: category.to_string(),
                path: format!("{}.{}", category, control),
            })?;
        Ok(Self {
            domain,
            control: control.trim().to_string(),
        })
    }
}

impl fmt::Display for ControlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.control)
    }
}

/// All six domains, each a flat map of sub-control name to [`Control`].
///
/// Every domain field is required when deserializing; a baseline that omits
/// one is rejected rather than treated as all-unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDomains {
    pub data_privacy: BTreeMap<String, Control>,
    pub security: BTreeMap<String, Control>,
    pub safety: BTreeMap<String, Control>,
    pub reliability: BTreeMap<String, Control>,
    pub accountability: BTreeMap<String, Control>,
    pub society: BTreeMap<String, Control>,
}

impl ControlDomains {
    pub fn domain(&self, domain: ControlDomain) -> &BTreeMap<String, Control> {
        match domain {
            ControlDomain::DataPrivacy => &self.data_privacy,
            ControlDomain::Security => &self.security,
            ControlDomain::Safety => &self.safety,
            ControlDomain::Reliability => &self.reliability,
            ControlDomain::Accountability => &self.accountability,
            ControlDomain::Society => &self.society,
        }
    }

    pub fn domain_mut(&mut self, domain: ControlDomain) -> &mut BTreeMap<String, Control> {
        match domain {
            ControlDomain::DataPrivacy => &mut self.data_privacy,
            ControlDomain::Security => &mut self.security,
            ControlDomain::Safety => &mut self.safety,
            ControlDomain::Reliability => &mut self.reliability,
            ControlDomain::Accountability => &mut self.accountability,
            ControlDomain::Society => &mut self.society,
        }
    }

    /// Look up a control. A control absent from its domain is `Unset`.
    pub fn get(&self, path: &ControlPath) -> Control {
        self.domain(path.domain)
            .get(&path.control)
            .copied()
            .unwrap_or_default()
    }

    /// Look up a control by dotted path (`"safety.human_oversight"`).
    pub fn lookup(&self, path: &str) -> Result<Control, ModelError> {
        Ok(self.get(&ControlPath::parse(path)?))
    }

    pub fn set(&mut self, path: &ControlPath, value: Control) {
        self.domain_mut(path.domain)
            .insert(path.control.clone(), value);
    }

    /// Controls in a domain that have not been assessed.
    pub fn unset_in(&self, domain: ControlDomain) -> Vec<String> {
        self.domain(domain)
            .iter()
            .filter(|(_, c)| !c.is_set())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_serializes_as_nullable_bool() {
        assert_eq!(serde_json::to_string(&Control::Enabled).unwrap(), "true");
        assert_eq!(serde_json::to_string(&Control::Disabled).unwrap(), "false");
        assert_eq!(serde_json::to_string(&Control::Unset).unwrap(), "null");

        let map: BTreeMap<String, Control> =
            serde_json::from_str(r#"{"a": true, "b": false, "c": null}"#).unwrap();
        assert_eq!(map["a"], Control::Enabled);
        assert_eq!(map["b"], Control::Disabled);
        assert_eq!(map["c"], Control::Unset);
    }

    #[test]
    fn unset_is_not_false() {
        assert_ne!(Control::Unset, Control::Disabled);
        assert!(!Control::Unset.is_set());
        assert!(Control::Disabled.is_set());
        assert!(!Control::Disabled.is_enabled());
    }

    #[test]
    fn domain_parsing_accepts_hyphens() {
        assert_eq!(
            "data-privacy".parse::<ControlDomain>(),
            Ok(ControlDomain::DataPrivacy)
        );
        assert_eq!("Security".parse::<ControlDomain>(), Ok(ControlDomain::Security));
        assert!("finance".parse::<ControlDomain>().is_err());
    }

    #[test]
    fn lookup_distinguishes_missing_control_from_unknown_domain() {
        let mut domains = ControlDomains::default();
        domains
            .safety
            .insert("human_oversight".to_string(), Control::Enabled);

        assert_eq!(domains.lookup("safety.human_oversight").unwrap(), Control::Enabled);
        // Missing control in a known domain: not assessed.
        assert_eq!(domains.lookup("safety.kill_switch").unwrap(), Control::Unset);
        // Unknown domain: a structural error.
        match domains.lookup("finance.audit") {
            Err(ModelError::UnknownControlDomain { domain, .. }) => assert_eq!(domain, "finance"),
            other => panic!("expected UnknownControlDomain, got {:?}", other),
        }
        assert!(matches!(
            domains.lookup("safety"),
            Err(ModelError::InvalidControlPath { .. })
        ));
    }

    #[test]
    fn unset_in_lists_unassessed_controls() {
        let mut domains = ControlDomains::default();
        domains.society.insert("bias_review".to_string(), Control::Unset);
        domains.society.insert("impact_statement".to_string(), Control::Enabled);
        assert_eq!(domains.unset_in(ControlDomain::Society), vec!["bias_review"]);
    }
}
