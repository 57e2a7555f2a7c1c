//! Workflow Module
//!
//! Workflows, steps and tasks: how they are parsed out of tagged records
//! and how a task's completion state is kept consistent.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (Step, Workflow, Task, TaskRecord)
//! - [`registry`]: De-duplicating step and workflow registries
//! - [`parser`]: Records to entities
//! - [`validator`]: Malformed record rules
//! - [`text`]: Tag extraction and add/remove-tag text helpers
//! - [`reconcile`]: Checkbox/step-tag reconciliation

pub mod model;
pub mod parser;
pub mod reconcile;
pub mod registry;
pub mod text;
pub mod validator;

pub use model::{
    ChildRecord, Location, Step, Task, TaskRecord, Workflow, WorkflowDefinition, WorkflowId,
    WorkflowKind,
};
pub use parser::{ParseOutcome, TagParser};
pub use reconcile::{reconcile, CompletionState, Correction};
pub use registry::{StepRegistry, WorkflowRegistry};
pub use validator::Malformation;
