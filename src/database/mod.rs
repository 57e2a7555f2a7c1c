//! Database Module
//!
//! The in-memory task database and the machinery that keeps it current.
//!
//! # Structure
//!
//! - [`corpus`]: Snapshot input and the [`CorpusSource`] seam
//! - [`engine`]: [`TaskDatabase`], the rebuild pipeline and queries
//! - [`limiter`]: Adaptive rate limiter for change bursts
//! - [`modules`]: Heading-based task grouping
//! - [`notice`]: User-facing notices for malformed or conflicting input
//! - [`service`]: Event-driven rebuild loop with initial retry

pub mod corpus;
pub mod engine;
pub mod limiter;
pub mod modules;
pub mod notice;
pub mod service;

pub use corpus::{CorpusSource, Document, Snapshot, SnapshotFile};
pub use engine::{ProjectFilter, RebuildOutcome, RebuildSummary, TaskDatabase};
pub use limiter::RateLimiter;
pub use modules::{Module, ModuleKey, ModuleMap};
pub use notice::{LogSink, Notice, NoticeBuffer, NoticeKind, NoticeSink};
pub use service::{channel, DatabaseEvent, DatabaseHandle, DatabaseService};
