//! Project Data Model
//!
//! Projects, their declarations, and the path keys both project trees are
//! built from. Paths live in a space rooted at `/`; a per-entity override
//! is keyed as `{file}:{project}`.

use std::fmt;

use serde::Serialize;

use crate::workflow::{Location, WorkflowId};

/// Name of the built-in catch-all project.
pub const UNCLASSIFIED: &str = "Unclassified";

/// Root of the path space, always owned by [`UNCLASSIFIED`].
pub const ROOT_PATH: &str = "/";

/// Unique per-registry project identifier; never reused.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub u32);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prj#{}", self.0)
    }
}

/// How a project path was declared.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    /// Frontmatter declaring the containing folder a project root
    Folder,
    /// Frontmatter declaring the file itself
    File,
    /// Project tag on a single task or workflow line
    TagOverride,
    /// The built-in root declaration of `Unclassified`
    System,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectDefinition {
    pub kind: DefinitionKind,
    /// Normalized path key
    pub path: String,
}

impl ProjectDefinition {
    pub fn new(kind: DefinitionKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// A named grouping of tasks and workflows. A `/` in the name denotes a
/// logical subproject, independent of where files live.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub definitions: Vec<ProjectDefinition>,
    pub tasks: Vec<Location>,
    pub workflows: Vec<WorkflowId>,
}

impl Project {
    pub fn new(id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            definitions: Vec::new(),
            tasks: Vec::new(),
            workflows: Vec::new(),
        }
    }

    pub fn is_unclassified(&self) -> bool {
        self.name == UNCLASSIFIED
    }

    /// Adds a definition unless an identical one is already present.
    pub fn add_definition(&mut self, definition: ProjectDefinition) {
        if !self.definitions.contains(&definition) {
            self.definitions.push(definition);
        }
    }

    /// Idempotent.
    pub fn link_task(&mut self, location: &Location) {
        if !self.tasks.contains(location) {
            self.tasks.push(location.clone());
        }
    }

    /// Idempotent.
    pub fn link_workflow(&mut self, workflow: WorkflowId) {
        if !self.workflows.contains(&workflow) {
            self.workflows.push(workflow);
        }
    }
}

/// Normalizes a document or folder path into the `/`-rooted key space.
///
/// # Example
///
/// ```
/// use taskweave::project::normalize_path;
///
/// assert_eq!(normalize_path("notes\\work//plan.md"), "/notes/work/plan.md");
/// assert_eq!(normalize_path("folder/"), "/folder");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.is_empty() {
        ROOT_PATH.to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Directory containing `path`, as a normalized key.
pub fn parent_dir(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rfind('/') {
        Some(0) | None => ROOT_PATH.to_string(),
        Some(idx) => normalized[..idx].to_string(),
    }
}

/// Resolution key of a task or workflow: its file, or `file:project` when it
/// carries a project override tag.
pub fn entity_key(path: &str, project_override: Option<&str>) -> String {
    let file = normalize_path(path);
    match project_override {
        Some(project) => format!("{}:{}", file, project),
        None => file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/folder1/file.md"), "/folder1");
        assert_eq!(parent_dir("file.md"), "/");
        assert_eq!(parent_dir("/"), "/");
    }

    #[test]
    fn test_entity_key() {
        assert_eq!(entity_key("folder1/file3", Some("Prj3")), "/folder1/file3:Prj3");
        assert_eq!(entity_key("/file_any", None), "/file_any");
    }

    #[test]
    fn test_project_links_idempotent() {
        let mut project = Project::new(ProjectId(1), "Main");
        let loc = Location::new("/a.md", 1);
        project.link_task(&loc);
        project.link_task(&loc);
        project.link_workflow(WorkflowId(2));
        project.link_workflow(WorkflowId(2));
        project.add_definition(ProjectDefinition::new(DefinitionKind::File, "/a.md"));
        project.add_definition(ProjectDefinition::new(DefinitionKind::File, "/a.md"));

        assert_eq!(project.tasks.len(), 1);
        assert_eq!(project.workflows.len(), 1);
        assert_eq!(project.definitions.len(), 1);
        assert!(!project.is_unclassified());
    }
}
