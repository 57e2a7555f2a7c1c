//! Taskweave - Tag-Driven Task and Workflow Database
//!
//! Builds an in-memory model of workflows, tasks and projects from tagged
//! checklist records in a notes corpus, and keeps each task's checkbox and
//! step tags consistent with its workflow.
//!
//! # Architecture
//!
//! The library is organized into five main modules:
//!
//! - [`workflow`]: Workflows, steps, tasks, parsing and reconciliation
//! - [`project`]: Project declarations, path resolution and the name tree
//! - [`database`]: The rebuild pipeline, queries and the reactive service
//! - [`config`]: User settings and tag vocabulary
//! - [`error`]: Error types shared across modules
//!
//! # Example
//!
//! ```rust,no_run
//! use taskweave::database::{SnapshotFile, TaskDatabase};
//! use taskweave::config::load_settings;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = load_settings("taskweave.yaml")?;
//!     let mut db = TaskDatabase::new(settings);
//!
//!     // Read the corpus snapshot and rebuild
//!     db.force_rebuild(&SnapshotFile::new("snapshot.yaml"));
//!
//!     for task in db.orphan_tasks() {
//!         println!("orphan: {} at {}", task.summary, task.location);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod project;
pub mod workflow;

// Re-export commonly used types
pub use config::{load_settings, Settings};
pub use database::{CorpusSource, Snapshot, TaskDatabase};
pub use error::{ConfigError, SourceError};
pub use project::{Project, ProjectId};
pub use workflow::model::{Step, Task, TaskRecord, Workflow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Taskweave";
