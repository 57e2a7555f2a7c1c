//! Tag Parser and Entity Factory
//!
//! Turns raw task records into workflows and tasks.
//!
//! Workflow definitions are processed in a first pass over all records so
//! that a task never binds to a definition that a later line redefines or
//! invalidates; tasks are built in a second pass against the settled
//! registry.

use log::{debug, info};

use crate::config::TagConfig;

use super::model::{Task, TaskRecord, WorkflowDefinition, WorkflowKind};
use super::registry::{StepRegistry, WorkflowRegistry};
use super::text::{first_tag_safe_token, strip_tags};
use super::validator::{check_task_record, check_workflow_record, Malformation};

/// Result of parsing a full set of records.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub tasks: Vec<Task>,
    pub malformed: Vec<Malformation>,
}

/// Record-to-entity factory for one tag vocabulary.
pub struct TagParser<'a> {
    tags: &'a TagConfig,
}

impl<'a> TagParser<'a> {
    pub fn new(tags: &'a TagConfig) -> Self {
        Self { tags }
    }

    /// Parses every record, filling the registries and returning the tasks.
    pub fn parse(
        &self,
        records: &[TaskRecord],
        steps: &mut StepRegistry,
        workflows: &mut WorkflowRegistry,
    ) -> ParseOutcome {
        let mut malformed = self.build_workflows(records, steps, workflows);
        let (tasks, task_malformed) = self.build_tasks(records, workflows);
        malformed.extend(task_malformed);

        info!(
            "Parsed {} records: {} workflows, {} tasks, {} malformed",
            records.len(),
            workflows.len(),
            tasks.len(),
            malformed.len()
        );

        ParseOutcome { tasks, malformed }
    }

    /// Workflow kind declared by a record, if it defines a workflow.
    pub fn definition_kind(&self, record: &TaskRecord) -> Option<WorkflowKind> {
        self.tags
            .type_tags()
            .into_iter()
            .find(|(_, tag)| record.has_tag(tag))
            .map(|(kind, _)| kind)
    }

    /// First pass: define or redefine a workflow for each definition line.
    pub fn build_workflows(
        &self,
        records: &[TaskRecord],
        steps: &mut StepRegistry,
        workflows: &mut WorkflowRegistry,
    ) -> Vec<Malformation> {
        let mut malformed = Vec::new();

        for record in records {
            let Some(kind) = self.definition_kind(record) else {
                continue;
            };

            let name = first_tag_safe_token(&strip_tags(&record.text));
            let known = name
                .as_deref()
                .map(|n| workflows.contains_name(n))
                .unwrap_or(false);

            if let Err(reason) = check_workflow_record(record, name.as_deref(), known) {
                debug!("Skipping workflow record: {}", reason);
                malformed.push(reason);
                continue;
            }
            let Some(name) = name else {
                continue;
            };

            let mut step_tags: Vec<&str> = Vec::new();
            for tag in &record.tags {
                if self.tags.is_step_tag(tag)
                    && !self.tags.is_type_tag(tag)
                    && !step_tags.contains(&tag.as_str())
                {
                    step_tags.push(tag);
                }
            }

            let definition = WorkflowDefinition {
                kind,
                steps: step_tags
                    .iter()
                    .map(|tag| steps.get_or_create(tag, &self.tags.step_prefix))
                    .collect(),
                location: record.location(),
                project_override: self.project_override(record),
            };

            let tag = self.tags.workflow_tag(&name);
            let id = workflows.define(&name, &tag, definition);

            if step_tags.is_empty() {
                workflows.remove(id);
                malformed.push(Malformation::NoSteps {
                    name,
                    location: record.location(),
                });
                continue;
            }

            debug!(
                "Workflow '{}' ({}) defined at {} with {} steps",
                name,
                kind,
                record.location(),
                step_tags.len()
            );
        }

        malformed
    }

    /// Second pass: bind every non-definition record that carries a known
    /// workflow tag.
    pub fn build_tasks(
        &self,
        records: &[TaskRecord],
        workflows: &WorkflowRegistry,
    ) -> (Vec<Task>, Vec<Malformation>) {
        let mut tasks = Vec::new();
        let mut malformed = Vec::new();

        for record in records {
            if self.definition_kind(record).is_some() {
                continue;
            }

            let Some(workflow) = record.tags.iter().find_map(|tag| workflows.by_tag(tag)) else {
                continue;
            };

            let summary = strip_tags(&record.text);
            if let Err(reason) = check_task_record(record, &summary) {
                debug!("Skipping task record: {}", reason);
                malformed.push(reason);
                continue;
            }

            let ticked_steps = workflow
                .steps
                .iter()
                .filter(|step| record.has_tag(&step.tag))
                .cloned()
                .collect();

            let mut managed_tags: Vec<String> = Vec::new();
            for tag in &record.tags {
                if self.tags.is_managed_tag(tag) && !managed_tags.contains(tag) {
                    managed_tags.push(tag.clone());
                }
            }

            tasks.push(Task {
                location: record.location(),
                text: record.text.clone(),
                summary,
                workflow: workflow.id,
                checked: record.checked,
                ticked_steps,
                projects: Vec::new(),
                managed_tags,
                project_override: self.project_override(record),
                section: record.section.clone(),
            });
        }

        (tasks, malformed)
    }

    fn project_override(&self, record: &TaskRecord) -> Option<String> {
        record
            .tags
            .iter()
            .find_map(|tag| self.tags.project_override(tag))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::text::extract_tags;
    use crate::workflow::Location;

    fn record(path: &str, line: usize, text: &str) -> TaskRecord {
        TaskRecord::new(path, line, text).with_tags(extract_tags(text))
    }

    fn parse(records: &[TaskRecord]) -> (ParseOutcome, StepRegistry, WorkflowRegistry) {
        let tags = TagConfig::default();
        let mut steps = StepRegistry::new();
        let mut workflows = WorkflowRegistry::new();
        let outcome = TagParser::new(&tags).parse(records, &mut steps, &mut workflows);
        (outcome, steps, workflows)
    }

    #[test]
    fn test_workflow_definition() {
        let records = vec![record(
            "/wf.md",
            1,
            "Publish flow #tpm/workflow_type/chain #tpm/step/draft #tpm/step/review",
        )];
        let (outcome, steps, workflows) = parse(&records);

        assert!(outcome.malformed.is_empty());
        let wf = workflows.by_name("Publish").unwrap();
        assert_eq!(wf.kind, WorkflowKind::Chain);
        assert_eq!(wf.tag, "#tpm/workflow/Publish");
        let names: Vec<_> = wf.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["draft", "review"]);
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_zero_step_workflow_removed() {
        let records = vec![record("/wf.md", 1, "Empty #tpm/workflow_type/checkbox")];
        let (outcome, _, workflows) = parse(&records);

        assert!(workflows.is_empty());
        assert!(matches!(
            outcome.malformed.as_slice(),
            [Malformation::NoSteps { name, .. }] if name == "Empty"
        ));
    }

    #[test]
    fn test_zero_step_redefinition_removes_earlier_definition() {
        let records = vec![
            record("/wf.md", 1, "Flow #tpm/workflow_type/chain #tpm/step/a"),
            record("/wf.md", 5, "Flow #tpm/workflow_type/chain"),
            record("/t.md", 1, "Task #tpm/workflow/Flow"),
        ];
        let (outcome, _, workflows) = parse(&records);
        assert!(workflows.by_name("Flow").is_none());
        assert!(outcome.tasks.is_empty());
    }

    #[test]
    fn test_multi_line_new_workflow_skipped() {
        let mut rec = record("/wf.md", 1, "Flow #tpm/workflow_type/chain #tpm/step/a");
        rec.text.push_str("\nsecond line");
        let (outcome, _, workflows) = parse(&[rec]);
        assert!(workflows.is_empty());
        assert!(matches!(outcome.malformed[0], Malformation::MultiLineWorkflow(_)));
    }

    #[test]
    fn test_later_definition_wins() {
        let records = vec![
            record("/a.md", 1, "Flow #tpm/workflow_type/chain #tpm/step/a #tpm/step/b"),
            record("/t.md", 3, "Task #tpm/workflow/Flow #tpm/step/x"),
            record("/b.md", 7, "Flow #tpm/workflow_type/checkbox #tpm/step/x"),
        ];
        let (outcome, _, workflows) = parse(&records);

        assert_eq!(workflows.len(), 1);
        let wf = workflows.by_name("Flow").unwrap();
        assert_eq!(wf.kind, WorkflowKind::Checkbox);
        assert_eq!(wf.location, Location::new("/b.md", 7));

        let task = &outcome.tasks[0];
        assert_eq!(task.workflow, wf.id);
        assert_eq!(task.ticked_steps.len(), 1);
        assert_eq!(task.ticked_steps[0].name, "x");
    }

    #[test]
    fn test_task_binding_and_attributes() {
        let records = vec![
            record("/wf.md", 1, "Flow #tpm/workflow_type/chain #tpm/step/a #tpm/step/b"),
            TaskRecord::new("/t.md", 4, "Write it #tpm/workflow/Flow #tpm/step/b #tpm/step/a")
                .with_tags([
                    "#tpm/workflow/Flow",
                    "#tpm/step/b",
                    "#tpm/step/a",
                    "#tpm/tag/hi",
                    "#tpm/project/Side",
                ])
                .with_checked(true)
                .with_section("Inbox"),
        ];
        let (outcome, _, _) = parse(&records);

        let task = &outcome.tasks[0];
        assert_eq!(task.summary, "Write it");
        assert!(task.checked);
        let ticked: Vec<_> = task.ticked_steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(ticked, vec!["a", "b"]);
        assert_eq!(task.managed_tags, vec!["#tpm/tag/hi".to_string()]);
        assert_eq!(task.project_override.as_deref(), Some("Side"));
        assert_eq!(task.section.as_deref(), Some("Inbox"));
    }

    #[test]
    fn test_first_workflow_tag_wins() {
        let records = vec![
            record("/wf.md", 1, "One #tpm/workflow_type/chain #tpm/step/a"),
            record("/wf.md", 2, "Two #tpm/workflow_type/chain #tpm/step/b"),
            record("/t.md", 1, "Task #tpm/workflow/Two #tpm/workflow/One"),
        ];
        let (outcome, _, workflows) = parse(&records);
        assert_eq!(outcome.tasks[0].workflow, workflows.by_name("Two").unwrap().id);
    }

    #[test]
    fn test_malformed_tasks_skipped() {
        let records = vec![
            record("/wf.md", 1, "Flow #tpm/workflow_type/chain #tpm/step/a"),
            record("/t.md", 1, "#tpm/workflow/Flow"),
            record("/t.md", 2, "Two\nlines #tpm/workflow/Flow"),
            record("/t.md", 3, "Plain line without workflow"),
        ];
        let (outcome, _, _) = parse(&records);
        assert!(outcome.tasks.is_empty());
        assert_eq!(outcome.malformed.len(), 2);
    }

    #[test]
    fn test_unknown_workflow_tag_is_not_a_task() {
        let records = vec![record("/t.md", 1, "Task #tpm/workflow/Missing")];
        let (outcome, _, _) = parse(&records);
        assert!(outcome.tasks.is_empty());
        assert!(outcome.malformed.is_empty());
    }
}
