//! Error types for diagram-dl
//!
//! A single [`Error`] enum covers every failure the library can surface. Per-item
//! failures during a batch are caught by the orchestrator and reported in the
//! [`RunSummary`](crate::types::RunSummary); they never abort the batch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for diagram-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for diagram-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "render_base_url")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level failure (connect, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The render server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Numeric HTTP status code
        status: u16,
        /// URL that was requested
        url: String,
    },

    /// The response body does not look like the requested format
    #[error("invalid artifact from {url}: {reason}")]
    InvalidArtifact {
        /// URL that produced the body
        url: String,
        /// What was wrong with it
        reason: String,
    },

    /// Completion marker could not be written
    #[error("failed to record completion for {path}: {reason}")]
    Marker {
        /// Artifact the marker belongs to
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_helper_sets_key() {
        let err = Error::config("format", "unknown format 'bmp'");
        match &err {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("format"));
                assert_eq!(message, "unknown format 'bmp'");
            }
            other => panic!("expected Config, got {other:?}"),
        }
        assert_eq!(err.to_string(), "configuration error: unknown format 'bmp'");
    }

    #[test]
    fn http_status_display_includes_url() {
        let err = Error::HttpStatus {
            status: 503,
            url: "http://render.local/png/abc".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from http://render.local/png/abc");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
