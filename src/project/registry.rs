//! Project Registry
//!
//! Builds projects from declarations:
//! - Document frontmatter: a folder-root key registers the document's
//!   directory, a file key registers the document itself
//! - Per-entity override tags register `{file}:{project}`
//!
//! The registry is cleared on every rebuild. `Unclassified` is recreated
//! each time with its system definition at the root.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::debug;
use serde_json::Value;

use crate::config::TagConfig;

use super::model::{
    entity_key, normalize_path, parent_dir, DefinitionKind, Project, ProjectDefinition, ProjectId,
    ROOT_PATH, UNCLASSIFIED,
};

/// A declaration that could not be honoured as written.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationConflict {
    /// Two folder roots at the same path; the later one is kept
    FolderCollision {
        path: String,
        kept: String,
        dropped: String,
    },
    /// A document declares both a folder root and a file project
    FolderOverFile {
        document: String,
        folder_project: String,
        file_project: String,
    },
}

impl fmt::Display for DeclarationConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FolderCollision {
                path,
                kept,
                dropped,
            } => write!(
                f,
                "Folder '{}' is declared as root of both '{}' and '{}'; keeping '{}'",
                path, dropped, kept, kept
            ),
            Self::FolderOverFile {
                document,
                folder_project,
                file_project,
            } => write!(
                f,
                "'{}' declares folder project '{}' and file project '{}'; the folder declaration wins",
                document, folder_project, file_project
            ),
        }
    }
}

/// Projects keyed by id with a name index.
#[derive(Debug)]
pub struct ProjectRegistry {
    projects: HashMap<ProjectId, Project>,
    by_name: HashMap<String, ProjectId>,
    folder_roots: HashMap<String, ProjectId>,
    unclassified: ProjectId,
    next_id: u32,
}

impl Default for ProjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectRegistry {
    /// Creates a registry holding only `Unclassified`.
    pub fn new() -> Self {
        let mut registry = Self {
            projects: HashMap::new(),
            by_name: HashMap::new(),
            folder_roots: HashMap::new(),
            unclassified: ProjectId(0),
            next_id: 0,
        };
        registry.install_unclassified();
        registry
    }

    fn install_unclassified(&mut self) {
        let id = self.get_or_create(UNCLASSIFIED);
        if let Some(project) = self.projects.get_mut(&id) {
            project.add_definition(ProjectDefinition::new(DefinitionKind::System, ROOT_PATH));
        }
        self.unclassified = id;
    }

    /// Drops every project. Ids keep increasing so none is ever reused.
    pub fn clear(&mut self) {
        self.projects.clear();
        self.by_name.clear();
        self.folder_roots.clear();
        self.install_unclassified();
    }

    pub fn get_or_create(&mut self, name: &str) -> ProjectId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        self.next_id += 1;
        let id = ProjectId(self.next_id);
        self.projects.insert(id, Project::new(id, name));
        self.by_name.insert(name.to_string(), id);
        debug!("Project '{}' created as {}", name, id);
        id
    }

    fn add_definition(&mut self, name: &str, definition: ProjectDefinition) -> ProjectId {
        let id = self.get_or_create(name);
        if let Some(project) = self.projects.get_mut(&id) {
            project.add_definition(definition);
        }
        id
    }

    /// Registers `folder` as the root of project `name`.
    pub fn declare_folder(&mut self, name: &str, folder: &str) -> Option<DeclarationConflict> {
        let path = normalize_path(folder);
        let mut conflict = None;

        if let Some(&previous) = self.folder_roots.get(&path) {
            let previous_name = self.projects.get(&previous).map(|p| p.name.clone());
            match previous_name {
                Some(previous_name) if previous_name != name => {
                    self.drop_definition(previous, DefinitionKind::Folder, &path);
                    conflict = Some(DeclarationConflict::FolderCollision {
                        path: path.clone(),
                        kept: name.to_string(),
                        dropped: previous_name,
                    });
                }
                _ => {}
            }
        }

        let id = self.add_definition(name, ProjectDefinition::new(DefinitionKind::Folder, &path));
        self.folder_roots.insert(path, id);
        conflict
    }

    /// Registers `file` as belonging to project `name`.
    pub fn declare_file(&mut self, name: &str, file: &str) -> ProjectId {
        let path = normalize_path(file);
        self.add_definition(name, ProjectDefinition::new(DefinitionKind::File, path))
    }

    /// Registers a per-entity override of `file` to project `name`.
    pub fn declare_override(&mut self, name: &str, file: &str) -> ProjectId {
        let key = entity_key(file, Some(name));
        self.add_definition(name, ProjectDefinition::new(DefinitionKind::TagOverride, key))
    }

    /// Reads folder/file project declarations from one document's
    /// frontmatter. When both are present the folder declaration wins.
    pub fn declare_document(
        &mut self,
        path: &str,
        frontmatter: &BTreeMap<String, Value>,
        tags: &TagConfig,
    ) -> Vec<DeclarationConflict> {
        let mut conflicts = Vec::new();
        let folder = project_name(frontmatter.get(&tags.folder_project_key));
        let file = project_name(frontmatter.get(&tags.file_project_key));

        match (folder, file) {
            (Some(folder), file) => {
                if let Some(file) = file {
                    let conflict = DeclarationConflict::FolderOverFile {
                        document: normalize_path(path),
                        folder_project: folder.to_string(),
                        file_project: file.to_string(),
                    };
                    debug!("{}", conflict);
                    conflicts.push(conflict);
                }
                if let Some(conflict) = self.declare_folder(folder, &parent_dir(path)) {
                    debug!("{}", conflict);
                    conflicts.push(conflict);
                }
            }
            (None, Some(file)) => {
                self.declare_file(file, path);
            }
            (None, None) => {}
        }

        conflicts
    }

    fn drop_definition(&mut self, id: ProjectId, kind: DefinitionKind, path: &str) {
        let Some(project) = self.projects.get_mut(&id) else {
            return;
        };
        project
            .definitions
            .retain(|d| !(d.kind == kind && d.path == path));

        if project.definitions.is_empty() {
            let name = project.name.clone();
            self.projects.remove(&id);
            self.by_name.remove(&name);
            debug!("Project '{}' lost its last definition and was removed", name);
        }
    }

    pub fn unclassified_id(&self) -> ProjectId {
        self.unclassified
    }

    pub fn get(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    pub fn get_mut(&mut self, id: ProjectId) -> Option<&mut Project> {
        self.projects.get_mut(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Project> {
        self.by_name.get(name).and_then(|id| self.projects.get(id))
    }

    /// All projects ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        let mut all: Vec<&Project> = self.projects.values().collect();
        all.sort_by_key(|p| p.id);
        all.into_iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.projects.values().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

fn project_name(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}
