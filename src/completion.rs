//! Completion cache
//!
//! Decides whether an artifact from an earlier run can be reused, which makes
//! re-running a partially failed batch cheap: only missing or incomplete
//! artifacts are fetched again.
//!
//! Two strategies are available:
//!
//! - [`SizeThreshold`]: the file exists and is larger than a minimum size. An
//!   error page or a truncated body is usually small, but a large corrupt
//!   body would pass.
//! - [`ChecksumMarker`]: after a successful fetch a `<artifact>.done` sidecar
//!   records the SHA-256 and length of the body that was written. The artifact
//!   is complete only while the file still matches the marker.

use crate::config::{CompletionConfig, CompletionStrategy};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Returns true iff a file exists at `path` and is strictly larger than `min_size_bytes`
pub fn is_already_complete(path: &Path, min_size_bytes: u64) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() > min_size_bytes,
        Err(_) => false,
    }
}

/// Strategy for recognising finished artifacts
#[async_trait]
pub trait CompletionCheck: Send + Sync {
    /// Whether the artifact at `path` can be reused without fetching
    async fn is_complete(&self, path: &Path) -> bool;

    /// Record that `body` was just written to `path`
    async fn record(&self, path: &Path, body: &[u8]) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Build the check selected by configuration
pub fn from_config(config: &CompletionConfig) -> Box<dyn CompletionCheck> {
    match config.strategy {
        CompletionStrategy::MinSize => Box::new(SizeThreshold::new(config.min_size_bytes)),
        CompletionStrategy::Checksum => Box::new(ChecksumMarker),
    }
}

/// File-size heuristic
#[derive(Clone, Copy, Debug)]
pub struct SizeThreshold {
    min_size_bytes: u64,
}

impl SizeThreshold {
    /// Files must exceed `min_size_bytes` to count as complete
    pub fn new(min_size_bytes: u64) -> Self {
        Self { min_size_bytes }
    }
}

#[async_trait]
impl CompletionCheck for SizeThreshold {
    async fn is_complete(&self, path: &Path) -> bool {
        match tokio::fs::metadata(path).await {
            Ok(meta) => meta.is_file() && meta.len() > self.min_size_bytes,
            Err(_) => false,
        }
    }

    async fn record(&self, _path: &Path, _body: &[u8]) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "min_size"
    }
}

/// Contents of a `.done` sidecar
#[derive(Debug, Serialize, Deserialize)]
struct Marker {
    sha256: String,
    bytes: u64,
    completed_at: chrono::DateTime<chrono::Utc>,
}

/// Checksum sidecar verification
#[derive(Clone, Copy, Debug, Default)]
pub struct ChecksumMarker;

impl ChecksumMarker {
    /// Sidecar location for an artifact (`diagrams/flow.png` -> `diagrams/flow.png.done`)
    pub fn marker_path(path: &Path) -> PathBuf {
        let mut name: OsString = path.as_os_str().to_owned();
        name.push(".done");
        PathBuf::from(name)
    }
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[async_trait]
impl CompletionCheck for ChecksumMarker {
    async fn is_complete(&self, path: &Path) -> bool {
        let marker_path = Self::marker_path(path);
        let marker: Marker = match tokio::fs::read(&marker_path).await {
            Ok(raw) => match serde_json::from_slice(&raw) {
                Ok(marker) => marker,
                Err(e) => {
                    tracing::debug!(path = %marker_path.display(), error = %e, "ignoring unreadable marker");
                    return false;
                }
            },
            Err(_) => return false,
        };

        let body = match tokio::fs::read(path).await {
            Ok(body) => body,
            Err(_) => return false,
        };

        let matches = body.len() as u64 == marker.bytes && sha256_hex(&body) == marker.sha256;
        if !matches {
            tracing::debug!(path = %path.display(), "artifact does not match its completion marker");
        }
        matches
    }

    async fn record(&self, path: &Path, body: &[u8]) -> Result<()> {
        let marker_path = Self::marker_path(path);
        let marker = Marker {
            sha256: sha256_hex(body),
            bytes: body.len() as u64,
            completed_at: chrono::Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&marker)?;
        tokio::fs::write(&marker_path, json)
            .await
            .map_err(|e| Error::Marker {
                path: marker_path.clone(),
                reason: e.to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "checksum"
    }
}
