//! Corpus Access
//!
//! The database never reads documents itself. It asks a [`CorpusSource`]
//! for one consistent snapshot of task records and document frontmatter
//! per rebuild.
//!
//! # Example Snapshot YAML
//!
//! ```yaml
//! documents:
//!   - path: work/index.md
//!     frontmatter:
//!       tpm_project_root: Work
//! records:
//!   - path: work/flows.md
//!     line: 3
//!     text: "Review #tpm/workflow_type/chain #tpm/step/draft #tpm/step/done"
//!     tags: ["#tpm/workflow_type/chain", "#tpm/step/draft", "#tpm/step/done"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SourceError;
use crate::workflow::text::extract_tags;
use crate::workflow::TaskRecord;

/// A document and its frontmatter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub path: String,
    #[serde(default)]
    pub frontmatter: BTreeMap<String, Value>,
}

impl Document {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            frontmatter: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.frontmatter.insert(key.into(), value.into());
        self
    }
}

/// Everything one rebuild reads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub records: Vec<TaskRecord>,
}

impl Snapshot {
    /// Fills in record tags from the text where the producer left them out.
    pub fn with_derived_tags(mut self) -> Self {
        for record in &mut self.records {
            if record.tags.is_empty() {
                record.tags = extract_tags(&record.text);
            }
        }
        self
    }
}

/// External query engine supplying the corpus.
pub trait CorpusSource {
    /// Returns the latest full snapshot, or [`SourceError::NotReady`] while
    /// the upstream index is still warming up.
    fn snapshot(&self) -> Result<Snapshot, SourceError>;
}

impl CorpusSource for Snapshot {
    fn snapshot(&self) -> Result<Snapshot, SourceError> {
        Ok(self.clone())
    }
}

/// Snapshot read from a YAML (or JSON) file on every call. A missing file
/// counts as "not ready yet".
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CorpusSource for SnapshotFile {
    fn snapshot(&self) -> Result<Snapshot, SourceError> {
        let display = self.path.display().to_string();
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(SourceError::NotReady),
            Err(source) => {
                return Err(SourceError::Io {
                    path: display,
                    source,
                })
            }
        };

        debug!("Snapshot loaded from {} ({} bytes)", display, content.len());

        let snapshot: Snapshot =
            serde_yaml::from_str(&content).map_err(|e| SourceError::Parse {
                path: display,
                message: e.to_string(),
            })?;
        Ok(snapshot.with_derived_tags())
    }
}
