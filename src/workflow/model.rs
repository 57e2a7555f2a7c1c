//! Workflow Data Model
//!
//! Core data structures for workflows, their steps, and the tasks that use
//! them, plus the raw record shape consumed from the corpus.
//!
//! # Example Records
//!
//! ```text
//! - [ ] Publish #tpm/workflow_type/chain #tpm/step/draft #tpm/step/review #tpm/step/done
//! - [ ] Blog post about tags #tpm/workflow/Publish #tpm/step/draft
//! ```
//!
//! The first line defines a chain workflow named `Publish` with three
//! steps; the second is a task using it, with `draft` ticked.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::project::ProjectId;

/// Source location of a record: document path plus line number.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub path: String,
    pub line: usize,
}

impl Location {
    pub fn new(path: impl Into<String>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

/// Completion semantics of a workflow.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowKind {
    /// Steps complete in order; the task completes with the last step
    Chain,
    /// Steps are independent; the task completes when all are ticked
    Checkbox,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chain => write!(f, "chain"),
            Self::Checkbox => write!(f, "checkbox"),
        }
    }
}

/// One unit of progress, identified by its tag.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    /// Full tag, e.g. `#tpm/step/review`
    pub tag: String,
    /// Tag with the step prefix stripped
    pub name: String,
}

impl Step {
    /// Creates a step from its tag, stripping `prefix` for the display name.
    pub fn new(tag: impl Into<String>, prefix: &str) -> Self {
        let tag = tag.into();
        let name = tag.strip_prefix(prefix).unwrap_or(&tag).to_string();
        Self { tag, name }
    }
}

/// Stable workflow identifier, preserved across redefinitions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkflowId(pub u32);

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wf#{}", self.0)
    }
}

/// The parts of a workflow a later definition line replaces.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDefinition {
    pub kind: WorkflowKind,
    pub steps: Vec<Arc<Step>>,
    pub location: Location,
    /// Explicit project override tag on the defining line
    pub project_override: Option<String>,
}

/// A named template of ordered steps.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    /// `workflow prefix + name`
    pub tag: String,
    pub kind: WorkflowKind,
    /// Ordered; the order is what makes a chain a chain
    pub steps: Vec<Arc<Step>>,
    pub location: Location,
    pub project_override: Option<String>,
}

impl Workflow {
    /// Builds the value for `id` from a definition.
    pub fn from_definition(
        id: WorkflowId,
        name: impl Into<String>,
        tag: impl Into<String>,
        definition: WorkflowDefinition,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            tag: tag.into(),
            kind: definition.kind,
            steps: definition.steps,
            location: definition.location,
            project_override: definition.project_override,
        }
    }

    /// Index of a step tag within the workflow, if it belongs to it.
    pub fn step_index(&self, tag: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.tag == tag)
    }

    /// The last-defined step, which completes a chain.
    pub fn last_step(&self) -> Option<&Arc<Step>> {
        self.steps.last()
    }

    /// Key used for project resolution.
    pub fn path_key(&self) -> String {
        crate::project::entity_key(&self.location.path, self.project_override.as_deref())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A nested child line of a record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ChildRecord {
    pub text: String,
}

/// Raw task record as supplied by the corpus query engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TaskRecord {
    pub path: String,
    pub line: usize,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub checked: bool,
    /// Nested child items. They are separate outline entries, so they never
    /// make the record itself multi-line and are otherwise not read.
    #[serde(default)]
    pub children: Vec<ChildRecord>,
    /// Nearest heading above the record, used for module grouping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl TaskRecord {
    pub fn new(path: impl Into<String>, line: usize, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            text: text.into(),
            ..Self::default()
        }
    }

    /// Sets the tags, normally the ones found in `text`.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn location(&self) -> Location {
        Location::new(self.path.clone(), self.line)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A single actionable record bound to exactly one workflow.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Task {
    pub location: Location,
    pub text: String,
    /// Text with every tag stripped
    pub summary: String,
    pub workflow: WorkflowId,
    /// Main checkbox state
    pub checked: bool,
    /// Workflow steps tagged on the record, in workflow order
    pub ticked_steps: Vec<Arc<Step>>,
    /// Resolved owning projects
    pub projects: Vec<ProjectId>,
    pub managed_tags: Vec<String>,
    pub project_override: Option<String>,
    pub section: Option<String>,
}

impl Task {
    pub fn has_step(&self, tag: &str) -> bool {
        self.ticked_steps.iter().any(|s| s.tag == tag)
    }

    pub fn has_managed_tag(&self, tag: &str) -> bool {
        self.managed_tags.iter().any(|t| t == tag)
    }

    /// Links an owning project; linking twice is a no-op.
    pub fn link_project(&mut self, project: ProjectId) {
        if !self.projects.contains(&project) {
            self.projects.push(project);
        }
    }

    /// Whether the ticked steps satisfy the workflow's completion rule.
    pub fn steps_complete(&self, workflow: &Workflow) -> bool {
        match workflow.kind {
            WorkflowKind::Checkbox => {
                !workflow.steps.is_empty() && workflow.steps.iter().all(|s| self.has_step(&s.tag))
            }
            WorkflowKind::Chain => workflow
                .last_step()
                .map(|last| self.has_step(&last.tag))
                .unwrap_or(false),
        }
    }

    /// Rank among `priorities` (lower is more urgent); unprioritised tasks
    /// sort after every prioritised one.
    pub fn priority(&self, priorities: &[String], managed_prefix: &str) -> usize {
        priorities
            .iter()
            .position(|p| self.has_managed_tag(&format!("{}{}", managed_prefix, p)))
            .unwrap_or(priorities.len())
    }

    /// Key used for project resolution.
    pub fn path_key(&self) -> String {
        crate::project::entity_key(&self.location.path, self.project_override.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(names: &[&str]) -> Vec<Arc<Step>> {
        names
            .iter()
            .map(|n| Arc::new(Step::new(format!("#tpm/step/{}", n), "#tpm/step/")))
            .collect()
    }

    fn workflow(kind: WorkflowKind, names: &[&str]) -> Workflow {
        Workflow::from_definition(
            WorkflowId(1),
            "Flow",
            "#tpm/workflow/Flow",
            WorkflowDefinition {
                kind,
                steps: steps(names),
                location: Location::new("/wf.md", 1),
                project_override: None,
            },
        )
    }

    fn task(ticked: Vec<Arc<Step>>) -> Task {
        Task {
            location: Location::new("/notes.md", 4),
            text: "Do it #tpm/workflow/Flow".to_string(),
            summary: "Do it".to_string(),
            workflow: WorkflowId(1),
            checked: false,
            ticked_steps: ticked,
            projects: Vec::new(),
            managed_tags: vec!["#tpm/tag/med".to_string()],
            project_override: None,
            section: None,
        }
    }

    #[test]
    fn test_step_name_strips_prefix() {
        let step = Step::new("#tpm/step/review", "#tpm/step/");
        assert_eq!(step.name, "review");
        assert_eq!(step.tag, "#tpm/step/review");
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("/a/b.md", 12).to_string(), "/a/b.md:12");
    }

    #[test]
    fn test_workflow_step_index() {
        let wf = workflow(WorkflowKind::Chain, &["a", "b", "c"]);
        assert_eq!(wf.step_index("#tpm/step/b"), Some(1));
        assert_eq!(wf.step_index("#tpm/step/z"), None);
        assert_eq!(wf.last_step().unwrap().name, "c");
        assert_eq!(wf.len(), 3);
    }

    #[test]
    fn test_checkbox_complete_regardless_of_order() {
        let wf = workflow(WorkflowKind::Checkbox, &["a", "b"]);
        let mut ticked = steps(&["b", "a"]);
        assert!(task(ticked.clone()).steps_complete(&wf));
        ticked.pop();
        assert!(!task(ticked).steps_complete(&wf));
    }

    #[test]
    fn test_chain_complete_on_last_step() {
        let wf = workflow(WorkflowKind::Chain, &["a", "b", "c"]);
        assert!(task(steps(&["c"])).steps_complete(&wf));
        assert!(!task(steps(&["a", "b"])).steps_complete(&wf));
    }

    #[test]
    fn test_link_project_idempotent() {
        let mut t = task(Vec::new());
        t.link_project(ProjectId(3));
        t.link_project(ProjectId(3));
        assert_eq!(t.projects, vec![ProjectId(3)]);
    }

    #[test]
    fn test_priority_rank() {
        let t = task(Vec::new());
        let priorities = vec!["hi".to_string(), "med".to_string(), "lo".to_string()];
        assert_eq!(t.priority(&priorities, "#tpm/tag/"), 1);
        assert_eq!(t.priority(&[], "#tpm/tag/"), 0);
    }

    #[test]
    fn test_record_builder() {
        let record = TaskRecord::new("/a.md", 3, "Write #x")
            .with_tags(["#x"])
            .with_checked(true)
            .with_section("Today");
        assert!(record.has_tag("#x"));
        assert!(record.checked);
        assert_eq!(record.location(), Location::new("/a.md", 3));
        assert_eq!(record.section.as_deref(), Some("Today"));
    }
}
