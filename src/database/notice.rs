//! User Notices
//!
//! Non-fatal, dismissable messages about the corpus: malformed records and
//! conflicting project declarations. The host decides how to show them.

use std::fmt;

use log::warn;
use serde::Serialize;

use crate::workflow::Location;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Malformed,
    Conflict,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Notice {
    pub fn malformed(message: impl Into<String>, location: Location) -> Self {
        Self {
            kind: NoticeKind::Malformed,
            message: message.into(),
            location: Some(location),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Conflict,
            message: message.into(),
            location: None,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Receives notices produced during a rebuild.
pub trait NoticeSink {
    fn notify(&mut self, notice: Notice);
}

/// Logs every notice as a warning.
#[derive(Debug, Default)]
pub struct LogSink;

impl NoticeSink for LogSink {
    fn notify(&mut self, notice: Notice) {
        warn!("{}", notice);
    }
}

/// Logs and keeps every notice; drained by the caller.
#[derive(Debug, Default)]
pub struct NoticeBuffer {
    notices: Vec<Notice>,
}

impl NoticeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

impl NoticeSink for NoticeBuffer {
    fn notify(&mut self, notice: Notice) {
        warn!("{}", notice);
        self.notices.push(notice);
    }
}
