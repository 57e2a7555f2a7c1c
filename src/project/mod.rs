//! Project Module
//!
//! Projects and the two independent trees that relate entities to them.
//!
//! # Structure
//!
//! - [`model`]: Project, ProjectDefinition, path keys
//! - [`registry`]: Declarations from frontmatter and override tags
//! - [`resolver`]: Physical path tree (which project owns a path)
//! - [`hierarchy`]: Logical name tree (subproject sharing, orphans)

pub mod hierarchy;
pub mod model;
pub mod registry;
pub mod resolver;

pub use hierarchy::{is_ancestor_or_self, NameHierarchy};
pub use model::{
    entity_key, normalize_path, parent_dir, DefinitionKind, Project, ProjectDefinition,
    ProjectId, ROOT_PATH, UNCLASSIFIED,
};
pub use registry::{DeclarationConflict, ProjectRegistry};
pub use resolver::PathResolver;
