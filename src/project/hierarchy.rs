//! Logical Project Hierarchy
//!
//! Subproject nesting by name: `A/B` is a subproject of `A` no matter
//! where either is declared on disk. Only used for sharing rules; path
//! ownership is the [`PathResolver`](super::PathResolver)'s job.
//!
//! Sharing, seen from both sides:
//! - a task belongs to its project and every name-ancestor
//! - a workflow belongs to its project and every name-descendant
//!
//! so a subproject may use its parents' workflows without leaking its own
//! upwards.

use std::collections::{BTreeSet, HashMap};

use super::model::UNCLASSIFIED;

/// Name tree over the projects of one rebuild.
#[derive(Debug, Clone, Default)]
pub struct NameHierarchy {
    names: BTreeSet<String>,
    /// Nearest registered ancestor per project
    parents: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
}

impl NameHierarchy {
    pub fn build<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let names: BTreeSet<String> = names.into_iter().map(str::to_string).collect();
        let mut parents = HashMap::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();

        for name in &names {
            let parent = name_prefixes(name).find(|prefix| names.contains(*prefix));
            if let Some(parent) = parent {
                parents.insert(name.clone(), parent.to_string());
                children
                    .entry(parent.to_string())
                    .or_default()
                    .push(name.clone());
            }
        }

        Self {
            names,
            parents,
            children,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Nearest registered ancestor.
    pub fn parent(&self, name: &str) -> Option<&str> {
        self.parents.get(name).map(String::as_str)
    }

    /// Registered ancestors, nearest first.
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.parent(name);
        while let Some(parent) = current {
            out.push(parent.to_string());
            current = self.parent(parent);
        }
        out
    }

    /// Registered descendants, depth first.
    pub fn descendants(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<&str> = vec![name];
        while let Some(current) = stack.pop() {
            if let Some(kids) = self.children.get(current) {
                for kid in kids {
                    out.push(kid.clone());
                    stack.push(kid);
                }
            }
        }
        out
    }

    /// Projects a task in `project` counts as a member of.
    pub fn task_membership(&self, project: &str) -> Vec<String> {
        let mut out = vec![project.to_string()];
        out.extend(self.ancestors(project));
        out
    }

    /// Projects a workflow in `project` counts as a member of.
    pub fn workflow_membership(&self, project: &str) -> Vec<String> {
        let mut out = vec![project.to_string()];
        out.extend(self.descendants(project));
        out
    }

    /// Whether a task resolved to `task_project` may use a workflow resolved
    /// to `workflow_project`.
    pub fn can_use(
        &self,
        task_project: &str,
        workflow_project: &str,
        unclassified_shared: bool,
    ) -> bool {
        if is_ancestor_or_self(workflow_project, task_project) {
            return true;
        }
        unclassified_shared && workflow_project == UNCLASSIFIED
    }

    /// A task is orphaned when it cannot use its own workflow.
    pub fn is_orphan(
        &self,
        task_project: &str,
        workflow_project: &str,
        unclassified_shared: bool,
    ) -> bool {
        !self.can_use(task_project, workflow_project, unclassified_shared)
    }
}

/// Name-based check: `A` is an ancestor of `A/B` and `A/B/C`, not of `AB`.
pub fn is_ancestor_or_self(ancestor: &str, name: &str) -> bool {
    name == ancestor
        || (name.len() > ancestor.len()
            && name.starts_with(ancestor)
            && name.as_bytes()[ancestor.len()] == b'/')
}

/// Proper prefixes of a project name at `/` boundaries, longest first.
fn name_prefixes(name: &str) -> impl Iterator<Item = &str> {
    name.char_indices()
        .filter(|(_, c)| *c == '/')
        .map(move |(idx, _)| &name[..idx])
        .filter(|prefix| !prefix.is_empty())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> NameHierarchy {
        NameHierarchy::build(["Unclassified", "Main", "Main/Sub1", "Main/Sub1/Sub2", "Other"])
    }

    #[test]
    fn test_ancestor_check() {
        assert!(is_ancestor_or_self("Main", "Main"));
        assert!(is_ancestor_or_self("Main", "Main/Sub1/Sub2"));
        assert!(!is_ancestor_or_self("Main", "MainX"));
        assert!(!is_ancestor_or_self("Main/Sub1", "Main"));
    }

    #[test]
    fn test_tree_shape() {
        let h = hierarchy();
        assert_eq!(h.parent("Main/Sub1/Sub2"), Some("Main/Sub1"));
        assert_eq!(h.ancestors("Main/Sub1/Sub2"), vec!["Main/Sub1", "Main"]);
        let mut desc = h.descendants("Main");
        desc.sort();
        assert_eq!(desc, vec!["Main/Sub1", "Main/Sub1/Sub2"]);
        assert!(h.descendants("Other").is_empty());
    }

    #[test]
    fn test_missing_intermediate_project() {
        let h = NameHierarchy::build(["A", "A/B/C"]);
        assert_eq!(h.parent("A/B/C"), Some("A"));
        assert!(!h.contains("A/B"));
    }

    #[test]
    fn test_workflow_sharing() {
        let h = hierarchy();
        for task in ["Main", "Main/Sub1", "Main/Sub1/Sub2"] {
            assert!(h.can_use(task, "Main", false), "{}", task);
        }
        assert!(h.can_use("Main/Sub1", "Main/Sub1", false));
        assert!(h.can_use("Main/Sub1/Sub2", "Main/Sub1", false));
        assert!(!h.can_use("Main", "Main/Sub1", false));
        assert!(h.is_orphan("Main", "Main/Sub1", true));
        assert!(!h.is_orphan("Main/Sub1", "Main", true));
    }

    #[test]
    fn test_unclassified_sharing_setting() {
        let h = hierarchy();
        assert!(h.can_use("Other", "Unclassified", true));
        assert!(!h.can_use("Other", "Unclassified", false));
        assert!(h.can_use("Unclassified", "Unclassified", false));
    }

    #[test]
    fn test_memberships_are_dual() {
        let h = hierarchy();
        let names = ["Unclassified", "Main", "Main/Sub1", "Main/Sub1/Sub2", "Other"];
        for task_project in names {
            for workflow_project in names {
                let task_side = h.task_membership(task_project).contains(&workflow_project.to_string());
                let workflow_side =
                    h.workflow_membership(workflow_project).contains(&task_project.to_string());
                assert_eq!(task_side, workflow_side);
                assert_eq!(task_side, h.can_use(task_project, workflow_project, false));
            }
        }
    }
}
