// resolver.rs - Requirement Resolver.
//
// Computes which framework controls apply to one environment transition:
// 1. Find the project's business unit (no org or no unit: nothing applies)
// 2. Gather every requirement of the unit's selected frameworks
// 3. Keep those whose transitions include "*" or the exact "src->dst"
// 4. Deduplicate by control id; mandatory dominates recommended
// 5. Order mandatory first, then recommended, each by control id

use std::collections::BTreeMap;

use keel_model::{FrameworkRequirement, FrameworkStore, Project, ProjectStore, RequirementLevel, Transition};

use crate::error::GateError;

/// Filter, deduplicate and order requirements for one transition.
pub fn resolve_requirements(
    requirements: Vec<FrameworkRequirement>,
    transition: &Transition,
) -> Vec<FrameworkRequirement> {
    let mut by_control: BTreeMap<String, FrameworkRequirement> = BTreeMap::new();

    for requirement in requirements.into_iter().filter(|r| r.applies_to(transition)) {
        match by_control.get(&requirement.control_id) {
            // First mandatory entry stays; a recommended one never replaces it.
            Some(kept) if kept.is_mandatory() || !requirement.is_mandatory() => {}
            _ => {
                by_control.insert(requirement.control_id.clone(), requirement);
            }
        }
    }

    let mut resolved: Vec<FrameworkRequirement> = by_control.into_values().collect();
    resolved.sort_by(|a, b| {
        level_rank(a.requirement_level)
            .cmp(&level_rank(b.requirement_level))
            .then_with(|| a.control_id.cmp(&b.control_id))
    });
    resolved
}

fn level_rank(level: RequirementLevel) -> u8 {
    match level {
        RequirementLevel::Mandatory => 0,
        RequirementLevel::Recommended => 1,
    }
}

/// Store-backed resolver over any backend serving projects and frameworks.
pub struct RequirementResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> RequirementResolver<'a, S>
where
    S: ProjectStore + FrameworkStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve by project id and environment names.
    pub fn resolve(
        &self,
        project_id: &str,
        source: &str,
        target: &str,
    ) -> Result<Vec<FrameworkRequirement>, GateError> {
        let project = self
            .store
            .get_project(project_id)?
            .ok_or_else(|| GateError::ProjectNotFound {
                project_id: project_id.to_string(),
            })?;
        self.resolve_for(&project, &Transition::new(source, target))
    }

    /// Resolve for an already-loaded project.
    pub fn resolve_for(
        &self,
        project: &Project,
        transition: &Transition,
    ) -> Result<Vec<FrameworkRequirement>, GateError> {
        let (Some(_), Some(unit_id)) = (&project.org_id, &project.business_unit_id) else {
            return Ok(Vec::new());
        };
        let Some(unit) = self.store.get_business_unit(unit_id)? else {
            tracing::debug!(
                project_id = %project.project_id,
                business_unit_id = %unit_id,
                "business unit not found; no framework requirements apply"
            );
            return Ok(Vec::new());
        };
        let requirements = self.store.requirements_for_frameworks(&unit.framework_ids)?;
        Ok(resolve_requirements(requirements, transition))
    }
}
