//! Physical Path Resolution
//!
//! Answers "which project owns this path" by longest-prefix match over the
//! keys registered by project definitions. The root is always registered
//! to `Unclassified`, so every walk terminates.

use std::collections::HashMap;

use log::{debug, warn};

use super::model::{normalize_path, ProjectId, ROOT_PATH};
use super::registry::ProjectRegistry;

/// Path-key to project lookup, rebuilt from the registry on every rebuild.
#[derive(Debug, Clone)]
pub struct PathResolver {
    keys: HashMap<String, ProjectId>,
    root: ProjectId,
}

impl PathResolver {
    /// Registers every definition path in `registry`.
    pub fn build(registry: &ProjectRegistry) -> Self {
        let root = registry.unclassified_id();
        let mut keys = HashMap::new();
        keys.insert(ROOT_PATH.to_string(), root);

        for project in registry.iter() {
            for definition in &project.definitions {
                if let Some(previous) = keys.insert(definition.path.clone(), project.id) {
                    if previous != project.id {
                        warn!(
                            "Path '{}' claimed by {} and {}; using {}",
                            definition.path, previous, project.id, project.id
                        );
                    }
                }
            }
        }

        debug!("Path resolver built with {} keys", keys.len());
        Self { keys, root }
    }

    /// Project owning `key`: the key itself if registered, otherwise the
    /// nearest registered ancestor.
    pub fn resolve(&self, key: &str) -> ProjectId {
        let mut current = normalize_key(key);
        loop {
            if let Some(&id) = self.keys.get(&current) {
                return id;
            }
            match parent_key(&current) {
                Some(parent) => current = parent,
                None => return self.root,
            }
        }
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.keys.contains_key(&normalize_key(key))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn normalize_key(key: &str) -> String {
    match key.split_once(':') {
        Some((file, project)) => format!("{}:{}", normalize_path(file), project),
        None => normalize_path(key),
    }
}

/// Next key up the tree: `file:project` -> `file`, `/a/b` -> `/a`,
/// `/a` -> `/`, `/` -> none.
fn parent_key(key: &str) -> Option<String> {
    if let Some((file, _)) = key.split_once(':') {
        return Some(file.to_string());
    }
    if key == ROOT_PATH {
        return None;
    }
    match key.rfind('/') {
        Some(0) | None => Some(ROOT_PATH.to_string()),
        Some(idx) => Some(key[..idx].to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (ProjectRegistry, PathResolver) {
        let mut registry = ProjectRegistry::new();
        registry.declare_override("Prj4", "/file_any");
        registry.declare_folder("Prj1", "/folder1");
        registry.declare_file("Prj2", "/folder1/file2");
        registry.declare_override("Prj3", "/folder1/file3");
        let resolver = PathResolver::build(&registry);
        (registry, resolver)
    }

    fn name(registry: &ProjectRegistry, id: ProjectId) -> String {
        registry.get(id).unwrap().name.clone()
    }

    #[test]
    fn test_parent_key_walk() {
        assert_eq!(parent_key("/a/b:P/Q"), Some("/a/b".to_string()));
        assert_eq!(parent_key("/a/b"), Some("/a".to_string()));
        assert_eq!(parent_key("/a"), Some("/".to_string()));
        assert_eq!(parent_key("/"), None);
    }

    #[test]
    fn test_root_and_undeclared_file() {
        let (registry, resolver) = fixture();
        assert_eq!(name(&registry, resolver.resolve("/")), "Unclassified");
        assert_eq!(name(&registry, resolver.resolve("/file_any")), "Unclassified");
    }

    #[test]
    fn test_task_level_override() {
        let (registry, resolver) = fixture();
        assert_eq!(name(&registry, resolver.resolve("/file_any:Prj4")), "Prj4");
    }

    #[test]
    fn test_folder_root_covers_files() {
        let (registry, resolver) = fixture();
        assert_eq!(name(&registry, resolver.resolve("/folder1/anything")), "Prj1");
        assert_eq!(name(&registry, resolver.resolve("/folder1/deep/nested.md")), "Prj1");
    }

    #[test]
    fn test_file_declaration_inside_folder() {
        let (registry, resolver) = fixture();
        assert_eq!(name(&registry, resolver.resolve("/folder1/file2")), "Prj2");
    }

    #[test]
    fn test_override_beats_containing_folder() {
        let (registry, resolver) = fixture();
        assert_eq!(name(&registry, resolver.resolve("/folder1/file3:Prj3")), "Prj3");
        assert_eq!(name(&registry, resolver.resolve("/folder1/file3")), "Prj1");
    }

    #[test]
    fn test_unregistered_override_falls_back_to_file() {
        let (registry, resolver) = fixture();
        assert_eq!(name(&registry, resolver.resolve("/folder1/file2:Ghost")), "Prj2");
    }

    #[test]
    fn test_relative_keys_are_normalized() {
        let (registry, resolver) = fixture();
        assert_eq!(name(&registry, resolver.resolve("folder1/x.md")), "Prj1");
        assert!(resolver.is_registered("folder1"));
        assert!(!resolver.is_empty());
    }
}
