//! Record Validation
//!
//! Rules deciding whether a raw record may become a workflow or a task:
//! - Records must fit on a single line
//! - Task summaries and workflow names must not be empty
//! - Workflows must declare at least one step

use std::fmt;

use super::model::{Location, TaskRecord};

/// Why a record was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Malformation {
    MultiLineWorkflow(Location),
    EmptyWorkflowName(Location),
    NoSteps { name: String, location: Location },
    MultiLineTask(Location),
    EmptySummary(Location),
}

impl Malformation {
    pub fn location(&self) -> &Location {
        match self {
            Self::MultiLineWorkflow(loc)
            | Self::EmptyWorkflowName(loc)
            | Self::MultiLineTask(loc)
            | Self::EmptySummary(loc) => loc,
            Self::NoSteps { location, .. } => location,
        }
    }
}

impl fmt::Display for Malformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultiLineWorkflow(loc) => {
                write!(f, "Workflow definition at {} spans multiple lines", loc)
            }
            Self::EmptyWorkflowName(loc) => {
                write!(f, "Workflow definition at {} has no usable name", loc)
            }
            Self::NoSteps { name, location } => {
                write!(f, "Workflow '{}' at {} declares no steps", name, location)
            }
            Self::MultiLineTask(loc) => write!(f, "Task at {} spans multiple lines", loc),
            Self::EmptySummary(loc) => {
                write!(f, "Task at {} has no text besides its tags", loc)
            }
        }
    }
}

/// True when the record text covers more than one line.
pub fn is_multi_line(text: &str) -> bool {
    text.trim_end().contains('\n')
}

/// Checks a workflow definition line. Only brand-new names are held to the
/// single-line rule; redefinitions of a known name are accepted as is.
pub fn check_workflow_record(
    record: &TaskRecord,
    name: Option<&str>,
    known_name: bool,
) -> Result<(), Malformation> {
    if name.is_none() {
        return Err(Malformation::EmptyWorkflowName(record.location()));
    }
    if !known_name && is_multi_line(&record.text) {
        return Err(Malformation::MultiLineWorkflow(record.location()));
    }
    Ok(())
}

/// Checks a task line against its derived summary.
pub fn check_task_record(record: &TaskRecord, summary: &str) -> Result<(), Malformation> {
    if is_multi_line(&record.text) {
        return Err(Malformation::MultiLineTask(record.location()));
    }
    if summary.trim().is_empty() {
        return Err(Malformation::EmptySummary(record.location()));
    }
    Ok(())
}
