//! # diagram-dl
//!
//! Renders PlantUML diagram sources to image files through a PlantUML render
//! server.
//!
//! Each diagram source is deflated and encoded into a URL token on the
//! client. It is then fetched as `GET {server}/{format}/{token}` and written
//! to `{output_dir}/{name}.{format}`. Failed requests are retried with a
//! pause between attempts. A completion cache skips diagrams that an earlier
//! run already rendered, so an interrupted or partially failed batch can be
//! re-run safely.
//!
//! ## Quick Start
//!
//! ```no_run
//! use diagram_dl::{Config, DiagramSpec, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::from_config(Config::default())?;
//!
//!     let specs = vec![DiagramSpec::new(
//!         "hello",
//!         "@startuml\nAlice -> Bob : hello\n@enduml",
//!     )];
//!
//!     let summary = orchestrator.run_all(&specs).await;
//!     println!("Success: {}/{}", summary.success_count, summary.total());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Completion cache strategies
pub mod completion;
/// Configuration types
pub mod config;
/// PlantUML text encoding
pub mod encoder;
/// Error types
pub mod error;
/// Retrying fetch of a render URL into a file
pub mod fetcher;
/// Diagram collections
pub mod manifest;
/// Batch orchestration
pub mod orchestrator;
/// Retry logic with configurable backoff
pub mod retry;
/// HTTP transport
pub mod transport;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use completion::{ChecksumMarker, CompletionCheck, SizeThreshold, is_already_complete};
pub use config::{CompletionStrategy, Config, OutputFormat, RetryConfig};
pub use encoder::encode;
pub use error::{Error, Result};
pub use fetcher::Fetcher;
pub use manifest::Manifest;
pub use orchestrator::Orchestrator;
pub use transport::{HttpTransport, Transport};
pub use types::{DiagramSpec, Event, FetchResult, ItemOutcome, ItemStatus, RunSummary};
