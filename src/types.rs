//! Core types and events

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A named diagram source
///
/// The source is opaque; it is compressed and forwarded to the render server
/// without being parsed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramSpec {
    /// Unique name, used as the artifact file stem
    pub name: String,
    /// Diagram source text
    pub source: String,
}

impl DiagramSpec {
    /// Create a new spec
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Check that the name can safely be used as a file stem inside the output directory
    pub fn validate_name(&self) -> Result<()> {
        let name = self.name.as_str();
        let reason = if name.trim().is_empty() {
            Some("name must not be empty")
        } else if name.starts_with('.') {
            Some("name must not start with '.'")
        } else if name.contains(['/', '\\']) {
            Some("name must not contain path separators")
        } else if name.contains('\0') {
            Some("name must not contain NUL")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::config("diagrams.name", format!("{reason}: {name:?}"))),
            None => Ok(()),
        }
    }
}

/// Outcome of fetching one URL into one file
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResult {
    /// Whether the body was written to `path`
    pub success: bool,
    /// Destination file
    pub path: PathBuf,
    /// Number of attempts made
    pub attempts: u32,
    /// Size of the written body (0 on failure)
    pub bytes: u64,
    /// Last error message on failure
    pub error: Option<String>,
}

/// What happened to a diagram during a batch run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// A complete artifact already existed, nothing was fetched
    Skipped,
    /// Freshly rendered and written
    Downloaded,
    /// All attempts failed
    Failed,
}

impl ItemStatus {
    /// Skipped and downloaded items both count as successes
    pub fn is_success(&self) -> bool {
        !matches!(self, ItemStatus::Failed)
    }
}

/// Per-diagram entry in a [`RunSummary`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Diagram name
    pub name: String,
    /// Artifact path
    pub path: PathBuf,
    /// Final status
    pub status: ItemStatus,
    /// Network attempts made (0 when skipped)
    pub attempts: u32,
    /// Error message when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of a batch run
///
/// `success_count + failure_count` always equals the number of specs processed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items that were skipped or downloaded
    pub success_count: usize,
    /// Items whose fetch failed
    pub failure_count: usize,
    /// One entry per spec, in input order
    pub outcomes: Vec<ItemOutcome>,
}

impl RunSummary {
    /// Number of items processed
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Names of failed items, in input order
    pub fn failed_names(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == ItemStatus::Failed)
            .map(|o| o.name.as_str())
    }

    pub(crate) fn push(&mut self, outcome: ItemOutcome) {
        if outcome.status.is_success() {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.outcomes.push(outcome);
    }
}

/// Event emitted while a batch runs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Artifact already complete, fetch skipped
    Skipped {
        /// Diagram name
        name: String,
        /// Existing artifact
        path: PathBuf,
    },

    /// Render request about to be sent
    Downloading {
        /// Diagram name
        name: String,
        /// Render URL
        url: String,
    },

    /// Artifact written
    Downloaded {
        /// Diagram name
        name: String,
        /// Artifact path
        path: PathBuf,
        /// Attempts it took
        attempts: u32,
        /// Body size in bytes
        bytes: u64,
    },

    /// All attempts failed
    Failed {
        /// Diagram name
        name: String,
        /// Attempts made
        attempts: u32,
        /// Last error message
        error: String,
    },

    /// Every spec has been processed
    BatchComplete {
        /// Skipped plus downloaded
        success: usize,
        /// Failed
        failed: usize,
        /// Total specs
        total: usize,
    },
}
