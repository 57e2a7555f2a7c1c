//! Step and Workflow Registries
//!
//! De-duplicating caches owned by a database instance. Both are cleared at
//! the start of every rebuild; workflow identifiers keep counting upwards
//! so an id is never handed out twice.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use super::model::{Location, Step, Workflow, WorkflowDefinition, WorkflowId};

/// Steps keyed by tag.
#[derive(Debug, Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<Step>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared step for `tag`, creating it on first sight.
    pub fn get_or_create(&mut self, tag: &str, prefix: &str) -> Arc<Step> {
        if let Some(step) = self.steps.get(tag) {
            return Arc::clone(step);
        }
        let step = Arc::new(Step::new(tag, prefix));
        self.steps.insert(tag.to_string(), Arc::clone(&step));
        step
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<Step>> {
        self.steps.get(tag)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}

/// Workflows keyed by id, with name and tag indexes.
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<WorkflowId, Workflow>,
    by_name: HashMap<String, WorkflowId>,
    by_tag: HashMap<String, WorkflowId>,
    next_id: u32,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `definition` under `name`.
    ///
    /// If the name is already taken the existing workflow is redefined and
    /// keeps its id, so tasks holding that id observe the new definition.
    pub fn define(&mut self, name: &str, tag: &str, definition: WorkflowDefinition) -> WorkflowId {
        if let Some(&id) = self.by_name.get(name) {
            debug!("Workflow '{}' redefined at {}", name, definition.location);
            self.redefine(id, definition);
            return id;
        }

        self.next_id += 1;
        let id = WorkflowId(self.next_id);
        let workflow = Workflow::from_definition(id, name, tag, definition);
        self.by_name.insert(name.to_string(), id);
        self.by_tag.insert(tag.to_string(), id);
        self.workflows.insert(id, workflow);
        id
    }

    /// Replaces the definition of `id`, keeping its id, name and tag.
    ///
    /// Returns the stable id together with the new value, or `None` if no
    /// workflow has that id.
    pub fn redefine(
        &mut self,
        id: WorkflowId,
        definition: WorkflowDefinition,
    ) -> Option<(WorkflowId, &Workflow)> {
        let current = self.workflows.get(&id)?;
        let updated =
            Workflow::from_definition(id, current.name.clone(), current.tag.clone(), definition);
        self.workflows.insert(id, updated);
        self.workflows.get(&id).map(|w| (id, w))
    }

    /// Drops a workflow and its indexes.
    pub fn remove(&mut self, id: WorkflowId) -> Option<Workflow> {
        let workflow = self.workflows.remove(&id)?;
        self.by_name.remove(&workflow.name);
        self.by_tag.remove(&workflow.tag);
        Some(workflow)
    }

    pub fn get(&self, id: WorkflowId) -> Option<&Workflow> {
        self.workflows.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Workflow> {
        self.by_name.get(name).and_then(|id| self.workflows.get(id))
    }

    pub fn by_tag(&self, tag: &str) -> Option<&Workflow> {
        self.by_tag.get(tag).and_then(|id| self.workflows.get(id))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Workflow whose current definition is bound to `location`.
    pub fn at(&self, location: &Location) -> Option<&Workflow> {
        self.workflows.values().find(|w| &w.location == location)
    }

    /// All workflows ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Workflow> {
        let mut all: Vec<&Workflow> = self.workflows.values().collect();
        all.sort_by_key(|w| w.id);
        all.into_iter()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Forgets every workflow; ids are not reset.
    pub fn clear(&mut self) {
        self.workflows.clear();
        self.by_name.clear();
        self.by_tag.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowKind;

    const PREFIX: &str = "#tpm/step/";

    fn definition(
        steps: &mut StepRegistry,
        kind: WorkflowKind,
        line: usize,
        names: &[&str],
    ) -> WorkflowDefinition {
        WorkflowDefinition {
            kind,
            steps: names
                .iter()
                .map(|n| steps.get_or_create(&format!("{}{}", PREFIX, n), PREFIX))
                .collect(),
            location: Location::new("/wf.md", line),
            project_override: None,
        }
    }

    #[test]
    fn test_step_registry_dedupes() {
        let mut steps = StepRegistry::new();
        let a = steps.get_or_create("#tpm/step/a", PREFIX);
        let b = steps.get_or_create("#tpm/step/a", PREFIX);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(steps.len(), 1);
        steps.clear();
        assert!(steps.is_empty());
    }

    #[test]
    fn test_define_and_lookup() {
        let mut steps = StepRegistry::new();
        let mut registry = WorkflowRegistry::new();
        let def = definition(&mut steps, WorkflowKind::Chain, 1, &["a", "b"]);
        let id = registry.define("Flow", "#tpm/workflow/Flow", def);

        assert_eq!(registry.by_name("Flow").unwrap().id, id);
        assert_eq!(registry.by_tag("#tpm/workflow/Flow").unwrap().id, id);
        assert_eq!(registry.at(&Location::new("/wf.md", 1)).unwrap().id, id);
        assert!(registry.contains_name("Flow"));
    }

    #[test]
    fn test_redefinition_preserves_identity() {
        let mut steps = StepRegistry::new();
        let mut registry = WorkflowRegistry::new();
        let first = definition(&mut steps, WorkflowKind::Chain, 1, &["a", "b"]);
        let second = definition(&mut steps, WorkflowKind::Checkbox, 9, &["x"]);

        let id = registry.define("Flow", "#tpm/workflow/Flow", first);
        let again = registry.define("Flow", "#tpm/workflow/Flow", second);

        assert_eq!(id, again);
        assert_eq!(registry.len(), 1);
        let wf = registry.get(id).unwrap();
        assert_eq!(wf.kind, WorkflowKind::Checkbox);
        assert_eq!(wf.location.line, 9);
        assert_eq!(wf.steps.len(), 1);
        assert!(registry.at(&Location::new("/wf.md", 1)).is_none());
    }

    #[test]
    fn test_redefine_unknown_id() {
        let mut steps = StepRegistry::new();
        let mut registry = WorkflowRegistry::new();
        let def = definition(&mut steps, WorkflowKind::Chain, 1, &["a"]);
        assert!(registry.redefine(WorkflowId(42), def).is_none());
    }

    #[test]
    fn test_remove_and_clear_never_reuse_ids() {
        let mut steps = StepRegistry::new();
        let mut registry = WorkflowRegistry::new();
        let def = definition(&mut steps, WorkflowKind::Chain, 1, &["a"]);
        let id = registry.define("Flow", "#tpm/workflow/Flow", def.clone());

        assert!(registry.remove(id).is_some());
        assert!(registry.by_name("Flow").is_none());
        assert!(registry.by_tag("#tpm/workflow/Flow").is_none());

        let second = registry.define("Flow", "#tpm/workflow/Flow", def.clone());
        registry.clear();
        let third = registry.define("Flow", "#tpm/workflow/Flow", def);
        assert!(id < second && second < third);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_iter_sorted_by_id() {
        let mut steps = StepRegistry::new();
        let mut registry = WorkflowRegistry::new();
        for name in ["C", "A", "B"] {
            let def = definition(&mut steps, WorkflowKind::Checkbox, 1, &["s"]);
            registry.define(name, &format!("#tpm/workflow/{}", name), def);
        }
        let names: Vec<_> = registry.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }
}
