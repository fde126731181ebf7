use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One entry of a source listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
}

/// A file materialized in the staging area. Raw content is replaced by cleaned content in place.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    pub local_path: PathBuf,
    pub content: Vec<u8>,
}

/// Where cleaned files go. Shared read-only by every file of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub container_name: String,
    pub conn_id: String,
}

/// What a successful upload produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobIdentity {
    pub container: String,
    pub blob_name: String,
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    List,
    Fetch,
    Clean,
    Save,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::List => "list",
            Stage::Fetch => "fetch",
            Stage::Clean => "clean",
            Stage::Save => "save",
            Stage::Upload => "upload",
        };
        f.write_str(label)
    }
}

/// Per-file progress through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileState {
    Listed,
    Fetched,
    Cleaned,
    Saved,
    Uploaded { blob: BlobIdentity },
    Failed { stage: Stage, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub name: String,
    pub state: FileState,
}

/// Result of one batch, in listing order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, name: &str, state: FileState) {
        self.outcomes.push(FileOutcome {
            name: name.to_string(),
            state,
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn uploaded(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, FileState::Uploaded { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, FileState::Failed { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn outcome(&self, name: &str) -> Option<&FileOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}
