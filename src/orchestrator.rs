//! Batch orchestration
//!
//! [`Orchestrator::run_all`] walks the diagram list strictly in order. For each
//! diagram it consults the completion cache, and only when that misses does it
//! encode the source and fetch the render. A per-item failure is recorded in
//! the [`RunSummary`] and the batch moves on; nothing short of process
//! termination stops a run early.
//!
//! Names are checked here as well as in [`Manifest`](crate::Manifest): a spec
//! whose name is unsafe as a file name, or repeats an earlier name in the same
//! batch, fails without a request.

use crate::completion::{self, CompletionCheck};
use crate::config::Config;
use crate::encoder::encode;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::manifest::check_name;
use crate::transport::{HttpTransport, Transport};
use crate::types::{DiagramSpec, Event, ItemOutcome, ItemStatus, RunSummary};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the event channel; slow subscribers lose the oldest events
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Runs a batch of diagrams through cache, encoder and fetcher
pub struct Orchestrator {
    config: Config,
    fetcher: Fetcher,
    completion: Box<dyn CompletionCheck>,
    event_tx: broadcast::Sender<Event>,
}

impl Orchestrator {
    /// Assemble an orchestrator from explicit parts
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        completion: Box<dyn CompletionCheck>,
    ) -> Self {
        let fetcher = Fetcher::new(transport, &config);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            fetcher,
            completion,
            event_tx,
        }
    }

    /// Validate `config` and build the HTTP transport and completion check it describes
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config.http)?);
        let completion = completion::from_config(&config.completion);
        Ok(Self::new(config, transport, completion))
    }

    /// Subscribe to batch events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process every spec in order and report the tally
    ///
    /// Sleeps `request_delay` between consecutive specs (not after the last).
    /// A spec with an unsafe or repeated name is recorded as failed without
    /// touching the network or the output directory.
    pub async fn run_all(&self, specs: &[DiagramSpec]) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut seen = HashSet::with_capacity(specs.len());

        tracing::info!(
            total = specs.len(),
            output_dir = %self.config.output_dir.display(),
            output_format = %self.config.format,
            completion = self.completion.name(),
            "starting batch"
        );

        for (index, spec) in specs.iter().enumerate() {
            let outcome = match check_name(spec, &mut seen) {
                Ok(()) => self.process(spec).await,
                Err(e) => self.reject(spec, e),
            };
            summary.push(outcome);

            if index + 1 < specs.len() && !self.config.request_delay.is_zero() {
                tracing::debug!(
                    delay_ms = self.config.request_delay.as_millis(),
                    "pacing before next diagram"
                );
                tokio::time::sleep(self.config.request_delay).await;
            }
        }

        tracing::info!(
            success = summary.success_count,
            failed = summary.failure_count,
            total = summary.total(),
            "batch complete"
        );
        self.emit(Event::BatchComplete {
            success: summary.success_count,
            failed: summary.failure_count,
            total: summary.total(),
        });

        summary
    }

    async fn process(&self, spec: &DiagramSpec) -> ItemOutcome {
        let path = self.config.artifact_path(&spec.name);

        if self.completion.is_complete(&path).await {
            tracing::info!(name = %spec.name, path = %path.display(), "skipping, already complete");
            self.emit(Event::Skipped {
                name: spec.name.clone(),
                path: path.clone(),
            });
            return ItemOutcome {
                name: spec.name.clone(),
                path,
                status: ItemStatus::Skipped,
                attempts: 0,
                error: None,
            };
        }

        let url = self.config.render_url(&encode(&spec.source));
        tracing::debug!(name = %spec.name, url = %url, "render url");
        self.emit(Event::Downloading {
            name: spec.name.clone(),
            url: url.clone(),
        });

        let (result, body) = self.fetcher.fetch_with_body(&url, &path).await;

        if let Some(body) = body {
            if let Err(e) = self.completion.record(&path, &body).await {
                tracing::warn!(
                    name = %spec.name,
                    error = %e,
                    "artifact written but completion not recorded; it will be fetched again next run"
                );
            }
            tracing::info!(
                name = %spec.name,
                path = %path.display(),
                attempts = result.attempts,
                bytes = result.bytes,
                "downloaded"
            );
            self.emit(Event::Downloaded {
                name: spec.name.clone(),
                path: result.path.clone(),
                attempts: result.attempts,
                bytes: result.bytes,
            });
            ItemOutcome {
                name: spec.name.clone(),
                path: result.path,
                status: ItemStatus::Downloaded,
                attempts: result.attempts,
                error: None,
            }
        } else {
            let error = result.error.unwrap_or_else(|| "unknown error".to_string());
            tracing::error!(
                name = %spec.name,
                attempts = result.attempts,
                error = %error,
                "failed"
            );
            self.emit(Event::Failed {
                name: spec.name.clone(),
                attempts: result.attempts,
                error: error.clone(),
            });
            ItemOutcome {
                name: spec.name.clone(),
                path: result.path,
                status: ItemStatus::Failed,
                attempts: result.attempts,
                error: Some(error),
            }
        }
    }

    fn reject(&self, spec: &DiagramSpec, error: Error) -> ItemOutcome {
        let error = error.to_string();
        tracing::error!(name = %spec.name, error = %error, "rejected");
        self.emit(Event::Failed {
            name: spec.name.clone(),
            attempts: 0,
            error: error.clone(),
        });
        ItemOutcome {
            name: spec.name.clone(),
            path: self.config.artifact_path(&spec.name),
            status: ItemStatus::Failed,
            attempts: 0,
            error: Some(error),
        }
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}
