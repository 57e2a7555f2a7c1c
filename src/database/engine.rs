//! Task Database
//!
//! Owns every derived registry and runs the full rebuild pipeline:
//! 1. Parse workflows, then tasks, from the record snapshot
//! 2. Build projects from frontmatter and override tags
//! 3. Rebuild the path resolver and the name hierarchy
//! 4. Link every task and workflow to its resolved project
//! 5. Compute orphan tasks and module groups
//! 6. Mark the database initialized and emit a completion event
//!
//! Each rebuild is a full rescan; nothing derived survives from the
//! previous pass except identifier counters.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::Settings;
use crate::error::SourceError;
use crate::project::{
    is_ancestor_or_self, normalize_path, NameHierarchy, PathResolver, Project, ProjectId,
    ProjectRegistry, UNCLASSIFIED,
};
use crate::workflow::reconcile::{self, Correction};
use crate::workflow::{
    Location, StepRegistry, TagParser, Task, Workflow, WorkflowId, WorkflowRegistry,
};

use super::corpus::{CorpusSource, Snapshot};
use super::limiter::RateLimiter;
use super::modules::ModuleMap;
use super::notice::{LogSink, Notice, NoticeSink};

/// Capacity of the completion event channel.
const EVENT_CAPACITY: usize = 16;

/// Counts describing one completed rebuild.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RebuildSummary {
    /// 1 for the first successful rebuild, then increasing
    pub generation: u64,
    pub workflows: usize,
    pub tasks: usize,
    pub projects: usize,
    pub orphans: usize,
    pub modules: usize,
    pub malformed: usize,
    pub conflicts: usize,
    pub completed_at: DateTime<Utc>,
}

/// What happened to a rebuild request.
#[derive(Debug)]
pub enum RebuildOutcome {
    Completed(RebuildSummary),
    /// Refused by the rate limiter
    Throttled,
    /// The corpus could not be read; retried later
    Unavailable(SourceError),
}

impl RebuildOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Which slice of the task list a view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectFilter {
    /// Everything, orphans included
    All,
    /// One project and, through the sharing rules, its relatives
    Project(String),
}

/// In-memory model of workflows, tasks, projects and modules.
pub struct TaskDatabase {
    settings: Settings,
    steps: StepRegistry,
    workflows: WorkflowRegistry,
    projects: ProjectRegistry,
    resolver: PathResolver,
    hierarchy: NameHierarchy,
    tasks: Vec<Task>,
    task_index: HashMap<Location, usize>,
    workflow_projects: HashMap<WorkflowId, ProjectId>,
    orphans: HashSet<Location>,
    modules: ModuleMap,
    limiter: RateLimiter,
    initialized: bool,
    generation: u64,
    notices: Box<dyn NoticeSink>,
    events: broadcast::Sender<RebuildSummary>,
}

impl TaskDatabase {
    /// Creates an empty database that logs notices.
    pub fn new(settings: Settings) -> Self {
        Self::with_notice_sink(settings, Box::new(LogSink))
    }

    pub fn with_notice_sink(settings: Settings, notices: Box<dyn NoticeSink>) -> Self {
        let projects = ProjectRegistry::new();
        let resolver = PathResolver::build(&projects);
        let hierarchy = NameHierarchy::build(projects.names());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            limiter: RateLimiter::new(&settings.rate_limit),
            settings,
            steps: StepRegistry::new(),
            workflows: WorkflowRegistry::new(),
            projects,
            resolver,
            hierarchy,
            tasks: Vec::new(),
            task_index: HashMap::new(),
            workflow_projects: HashMap::new(),
            orphans: HashSet::new(),
            modules: ModuleMap::default(),
            initialized: false,
            generation: 0,
            notices,
            events,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replaces the settings; takes effect from the next rebuild.
    pub fn set_settings(&mut self, settings: Settings) {
        self.limiter = RateLimiter::new(&settings.rate_limit);
        self.settings = settings;
    }

    /// True once a rebuild has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Receives one [`RebuildSummary`] per successful rebuild.
    pub fn subscribe(&self) -> broadcast::Receiver<RebuildSummary> {
        self.events.subscribe()
    }

    /// Rebuilds if the rate limiter allows it.
    pub fn request_rebuild(&mut self, source: &dyn CorpusSource) -> RebuildOutcome {
        if !self.limiter.try_acquire() {
            debug!("Rebuild request throttled");
            return RebuildOutcome::Throttled;
        }
        self.force_rebuild(source)
    }

    /// Rebuilds regardless of the rate limiter.
    pub fn force_rebuild(&mut self, source: &dyn CorpusSource) -> RebuildOutcome {
        match source.snapshot() {
            Ok(snapshot) => RebuildOutcome::Completed(self.rebuild(snapshot)),
            Err(SourceError::NotReady) => {
                debug!("Corpus not ready, rebuild postponed");
                RebuildOutcome::Unavailable(SourceError::NotReady)
            }
            Err(e) => {
                warn!("Rebuild skipped: {}", e);
                RebuildOutcome::Unavailable(e)
            }
        }
    }

    /// Runs the full pipeline over `snapshot`.
    pub fn rebuild(&mut self, mut snapshot: Snapshot) -> RebuildSummary {
        for record in &mut snapshot.records {
            record.path = normalize_path(&record.path);
        }
        for document in &mut snapshot.documents {
            document.path = normalize_path(&document.path);
        }

        self.steps.clear();
        self.workflows.clear();
        self.projects.clear();
        self.tasks.clear();
        self.task_index.clear();
        self.workflow_projects.clear();
        self.orphans.clear();

        let tags = self.settings.tags.clone();

        // Workflows and tasks
        let outcome =
            TagParser::new(&tags).parse(&snapshot.records, &mut self.steps, &mut self.workflows);
        let malformed = outcome.malformed.len();
        if self.settings.report_malformed_task {
            for reason in outcome.malformed {
                let location = reason.location().clone();
                self.notices.notify(Notice::malformed(reason.to_string(), location));
            }
        }
        self.tasks = outcome.tasks;

        // Projects
        let mut conflicts = 0;
        for document in &snapshot.documents {
            for conflict in
                self.projects
                    .declare_document(&document.path, &document.frontmatter, &tags)
            {
                conflicts += 1;
                self.notices.notify(Notice::conflict(conflict.to_string()));
            }
        }
        for workflow in self.workflows.iter() {
            if let Some(name) = &workflow.project_override {
                self.projects.declare_override(name, &workflow.location.path);
            }
        }
        for task in &self.tasks {
            if let Some(name) = &task.project_override {
                self.projects.declare_override(name, &task.location.path);
            }
        }

        // Trees
        self.resolver = PathResolver::build(&self.projects);
        self.hierarchy = NameHierarchy::build(self.projects.names());

        // Links
        let workflow_keys: Vec<(WorkflowId, String)> =
            self.workflows.iter().map(|w| (w.id, w.path_key())).collect();
        for (id, key) in workflow_keys {
            let project = self.resolver.resolve(&key);
            if let Some(p) = self.projects.get_mut(project) {
                p.link_workflow(id);
            }
            self.workflow_projects.insert(id, project);
        }

        for (idx, task) in self.tasks.iter_mut().enumerate() {
            let project = self.resolver.resolve(&task.path_key());
            task.link_project(project);
            if let Some(p) = self.projects.get_mut(project) {
                p.link_task(&task.location);
            }
            self.task_index.insert(task.location.clone(), idx);
        }

        // Orphans
        let shared = self.settings.unclassified_workflows_available_to_all_projects;
        for task in &self.tasks {
            let task_project = self.project_name(task.projects.first().copied());
            let workflow_project = self.project_name(self.workflow_projects.get(&task.workflow).copied());
            if self.hierarchy.is_orphan(task_project, workflow_project, shared) {
                debug!(
                    "Task {} in '{}' is orphaned from workflow project '{}'",
                    task.location, task_project, workflow_project
                );
                self.orphans.insert(task.location.clone());
            }
        }

        self.modules = ModuleMap::build(&self.tasks);

        self.initialized = true;
        self.generation += 1;
        let summary = RebuildSummary {
            generation: self.generation,
            workflows: self.workflows.len(),
            tasks: self.tasks.len(),
            projects: self.projects.len(),
            orphans: self.orphans.len(),
            modules: self.modules.len(),
            malformed,
            conflicts,
            completed_at: Utc::now(),
        };

        info!(
            "Rebuild #{} complete: {} workflows, {} tasks, {} projects, {} orphans",
            summary.generation, summary.workflows, summary.tasks, summary.projects, summary.orphans
        );

        // No subscribers is fine.
        let _ = self.events.send(summary.clone());
        summary
    }

    fn project_name(&self, id: Option<ProjectId>) -> &str {
        id.and_then(|id| self.projects.get(id))
            .map(|p| p.name.as_str())
            .unwrap_or(UNCLASSIFIED)
    }

    // Lookups

    pub fn workflows(&self) -> impl Iterator<Item = &Workflow> {
        self.workflows.iter()
    }

    pub fn workflow(&self, id: WorkflowId) -> Option<&Workflow> {
        self.workflows.get(id)
    }

    pub fn workflow_by_name(&self, name: &str) -> Option<&Workflow> {
        self.workflows.by_name(name)
    }

    /// Workflow defined at `path:line`.
    pub fn workflow_at(&self, path: &str, line: usize) -> Option<&Workflow> {
        self.workflows.at(&Location::new(normalize_path(path), line))
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Task at `path:line`.
    pub fn task_at(&self, path: &str, line: usize) -> Option<&Task> {
        let location = Location::new(normalize_path(path), line);
        self.task_index.get(&location).map(|&idx| &self.tasks[idx])
    }

    /// First task whose tag-stripped summary equals `summary`.
    pub fn task_by_summary(&self, summary: &str) -> Option<&Task> {
        let wanted = summary.trim();
        self.tasks.iter().find(|t| t.summary == wanted)
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter()
    }

    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.by_name(name)
    }

    pub fn project_by_id(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(id)
    }

    /// Project owning a path or `file:project` key.
    pub fn project_for_path(&self, path: &str) -> Option<&Project> {
        self.projects.get(self.resolver.resolve(path))
    }

    pub fn project_of_task(&self, task: &Task) -> Option<&Project> {
        task.projects.first().and_then(|&id| self.projects.get(id))
    }

    pub fn project_of_workflow(&self, id: WorkflowId) -> Option<&Project> {
        self.workflow_projects
            .get(&id)
            .and_then(|&pid| self.projects.get(pid))
    }

    pub fn hierarchy(&self) -> &NameHierarchy {
        &self.hierarchy
    }

    pub fn modules(&self) -> &ModuleMap {
        &self.modules
    }

    pub fn is_orphan(&self, task: &Task) -> bool {
        self.orphans.contains(&task.location)
    }

    pub fn orphan_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| self.is_orphan(t)).collect()
    }

    // Views

    /// Tasks using one of `workflows` that carry any of `include` (if given)
    /// and none of `exclude`, ordered by priority then location.
    pub fn get_filtered_tasks(
        &self,
        workflows: &[WorkflowId],
        include: &[String],
        exclude: &[String],
    ) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| workflows.contains(&t.workflow))
            .filter(|t| include.is_empty() || include.iter().any(|tag| t.has_managed_tag(tag)))
            .filter(|t| exclude.is_empty() || !exclude.iter().any(|tag| t.has_managed_tag(tag)))
            .collect();

        let priorities = &self.settings.priority_tags;
        let prefix = &self.settings.tags.managed_prefix;
        tasks.sort_by(|a, b| {
            a.priority(priorities, prefix)
                .cmp(&b.priority(priorities, prefix))
                .then_with(|| a.location.cmp(&b.location))
        });
        tasks
    }

    /// Tasks shown by a project view. Orphans only appear under [`ProjectFilter::All`].
    pub fn tasks_in_view(&self, filter: &ProjectFilter) -> Vec<&Task> {
        match filter {
            ProjectFilter::All => self.tasks.iter().collect(),
            ProjectFilter::Project(name) => self
                .tasks
                .iter()
                .filter(|t| !self.is_orphan(t))
                .filter(|t| {
                    let own = self.project_name(t.projects.first().copied());
                    is_ancestor_or_self(name, own)
                })
                .collect(),
        }
    }

    /// Workflows offered by a project view.
    pub fn workflows_in_view(&self, filter: &ProjectFilter) -> Vec<&Workflow> {
        let ProjectFilter::Project(name) = filter else {
            return self.workflows.iter().collect();
        };

        let shared = self.settings.unclassified_workflows_available_to_all_projects;
        let subprojects = self.settings.show_subproject_workflows;
        self.workflows
            .iter()
            .filter(|w| {
                let own = self.project_name(self.workflow_projects.get(&w.id).copied());
                self.hierarchy.can_use(name, own, shared)
                    || (subprojects && is_ancestor_or_self(name, own))
            })
            .collect()
    }

    // Reconciliation

    /// Correction for the task at `path:line`, or `None` if it is
    /// consistent or unknown.
    pub fn reconcile_task(&self, path: &str, line: usize) -> Option<Correction> {
        let task = self.task_at(path, line)?;
        let workflow = self.workflows.get(task.workflow)?;
        reconcile::reconcile(task, workflow)
    }

    /// Every correction currently needed, in task order.
    pub fn pending_corrections(&self) -> Vec<(&Task, Correction)> {
        self.tasks
            .iter()
            .filter_map(|task| {
                let workflow = self.workflows.get(task.workflow)?;
                reconcile::reconcile(task, workflow).map(|c| (task, c))
            })
            .collect()
    }

    /// Edit for the user toggling a task's main checkbox.
    pub fn edit_main(&self, path: &str, line: usize, ticked: bool) -> Option<Correction> {
        let task = self.task_at(path, line)?;
        let workflow = self.workflows.get(task.workflow)?;
        Some(reconcile::edit_main(task, workflow, ticked))
    }

    /// Edit for the user toggling one step tag on a task.
    pub fn edit_step(
        &self,
        path: &str,
        line: usize,
        step_tag: &str,
        ticked: bool,
    ) -> Option<Correction> {
        let task = self.task_at(path, line)?;
        let workflow = self.workflows.get(task.workflow)?;
        reconcile::edit_step(task, workflow, step_tag, ticked)
    }
}
