//! Module Grouping
//!
//! Groups tasks by the heading they sit under. Purely a projection of the
//! task list; tasks without a heading land in the reserved unclassified
//! bucket.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::workflow::{Location, Task};

/// Module identifier.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKey {
    /// Tasks outside any heading
    Unclassified,
    /// A heading within one document
    Section { path: String, heading: String },
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclassified => write!(f, "unclassified"),
            Self::Section { path, heading } => write!(f, "{}#{}", path, heading),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Module {
    pub key: ModuleKey,
    pub name: String,
    pub tasks: Vec<Location>,
}

/// Modules keyed by [`ModuleKey`].
#[derive(Debug, Clone, Default)]
pub struct ModuleMap {
    modules: BTreeMap<ModuleKey, Module>,
}

impl ModuleMap {
    pub fn build(tasks: &[Task]) -> Self {
        let mut modules: BTreeMap<ModuleKey, Module> = BTreeMap::new();

        for task in tasks {
            let heading = task
                .section
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty());
            let (key, name) = match heading {
                Some(heading) => (
                    ModuleKey::Section {
                        path: task.location.path.clone(),
                        heading: heading.to_string(),
                    },
                    heading.to_string(),
                ),
                None => (ModuleKey::Unclassified, "Unclassified".to_string()),
            };

            modules
                .entry(key.clone())
                .or_insert_with(|| Module {
                    key,
                    name,
                    tasks: Vec::new(),
                })
                .tasks
                .push(task.location.clone());
        }

        Self { modules }
    }

    pub fn get(&self, key: &ModuleKey) -> Option<&Module> {
        self.modules.get(key)
    }

    pub fn unclassified(&self) -> Option<&Module> {
        self.modules.get(&ModuleKey::Unclassified)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
