//! Fetch a render URL into a file, with retries
//!
//! Bodies are first written to a `<destination>.part` file and then renamed
//! into place, so an interrupted or failed attempt never leaves a truncated
//! artifact that a later completion check could mistake for a finished one.

use crate::config::{Config, OutputFormat, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff;
use crate::transport::Transport;
use crate::types::FetchResult;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Downloads render results to disk
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    format: OutputFormat,
    validate_signature: bool,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("retry", &self.retry)
            .field("format", &self.format)
            .field("validate_signature", &self.validate_signature)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    /// Create a fetcher using `transport` and the retry and format settings from `config`
    pub fn new(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            transport,
            retry: config.retry.clone(),
            format: config.format,
            validate_signature: config.validate_signature,
        }
    }

    /// Fetch `url` into `destination`
    ///
    /// Never returns an error: failures are reported through
    /// [`FetchResult::success`] and [`FetchResult::error`]. An existing file at
    /// `destination` is replaced only by a complete, successful body.
    pub async fn fetch(&self, url: &str, destination: &Path) -> FetchResult {
        self.fetch_with_body(url, destination).await.0
    }

    /// Like [`Fetcher::fetch`], also handing back the body that was written
    pub(crate) async fn fetch_with_body(
        &self,
        url: &str,
        destination: &Path,
    ) -> (FetchResult, Option<Vec<u8>>) {
        let mut attempts = 0;

        let outcome = retry_with_backoff(&self.retry, |attempt| {
            attempts = attempt;
            tracing::info!(
                path = %destination.display(),
                attempt,
                "downloading"
            );
            self.attempt(url, destination)
        })
        .await;

        match outcome {
            Ok(body) => {
                let result = FetchResult {
                    success: true,
                    path: destination.to_path_buf(),
                    attempts,
                    bytes: body.len() as u64,
                    error: None,
                };
                (result, Some(body))
            }
            Err(e) => {
                let result = FetchResult {
                    success: false,
                    path: destination.to_path_buf(),
                    attempts,
                    bytes: 0,
                    error: Some(e.to_string()),
                };
                (result, None)
            }
        }
    }

    async fn attempt(&self, url: &str, destination: &Path) -> Result<Vec<u8>> {
        let body = self.transport.get(url).await?;

        if self.validate_signature {
            self.format
                .check_signature(&body)
                .map_err(|reason| Error::InvalidArtifact {
                    url: url.to_string(),
                    reason,
                })?;
        }

        write_atomically(destination, &body).await?;
        Ok(body)
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name: OsString = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Write `body` next to `destination` and rename it into place
async fn write_atomically(destination: &Path, body: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let part = part_path(destination);
    let written = match tokio::fs::write(&part, body).await {
        Ok(()) => tokio::fs::rename(&part, destination).await,
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        // Best effort; the .part file is never read back anyway
        let _ = tokio::fs::remove_file(&part).await;
        return Err(e.into());
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n0000IHDR-test-image";

    /// Replays a scripted sequence of responses, repeating the last one
    struct ScriptedTransport {
        script: Mutex<Vec<Result<Vec<u8>>>>,
        calls: AtomicU32,
        call_times: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<Vec<u8>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
                call_times: Mutex::new(Vec::new()),
            })
        }
    }

    fn unavailable() -> Result<Vec<u8>> {
        Err(Error::HttpStatus {
            status: 503,
            url: "http://render.local".to_string(),
        })
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.call_times.lock().unwrap().push(Instant::now());
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                match &script[0] {
                    Ok(body) => Ok(body.clone()),
                    Err(_) => unavailable(),
                }
            }
        }
    }

    fn config(max_attempts: u32, delay: Duration) -> Config {
        let mut config = Config::default();
        config.retry.max_attempts = max_attempts;
        config.retry.initial_delay = delay;
        config
    }

    #[tokio::test]
    async fn writes_body_on_first_success() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.png");
        let transport = ScriptedTransport::new(vec![Ok(PNG.to_vec())]);

        let result = Fetcher::new(transport.clone(), &config(3, Duration::from_millis(10)))
            .fetch("http://render.local/png/x", &dest)
            .await;

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.bytes, PNG.len() as u64);
        assert_eq!(result.path, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), PNG);
        assert!(!part_path(&dest).exists());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hands_back_the_written_body() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.png");
        let transport = ScriptedTransport::new(vec![unavailable(), Ok(PNG.to_vec())]);
        let fetcher = Fetcher::new(transport, &config(2, Duration::from_millis(5)));

        let (result, body) = fetcher
            .fetch_with_body("http://render.local/png/x", &dest)
            .await;
        assert!(result.success);
        assert_eq!(body.as_deref(), Some(PNG));

        let failing = Fetcher::new(
            ScriptedTransport::new(vec![unavailable()]),
            &config(1, Duration::ZERO),
        );
        let (result, body) = failing
            .fetch_with_body("http://render.local/png/y", &dir.path().join("b.png"))
            .await;
        assert!(!result.success);
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.png");
        let transport =
            ScriptedTransport::new(vec![unavailable(), unavailable(), Ok(PNG.to_vec())]);

        let result = Fetcher::new(transport.clone(), &config(3, Duration::from_millis(10)))
            .fetch("http://render.local/png/x", &dest)
            .await;

        assert!(result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_attempts_with_backoff_between_them() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.png");
        let transport = ScriptedTransport::new(vec![unavailable()]);

        let result = Fetcher::new(transport.clone(), &config(3, Duration::from_millis(40)))
            .fetch("http://render.local/png/x", &dest)
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.bytes, 0);
        assert!(result.error.as_deref().unwrap().contains("503"));
        assert!(!dest.exists());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

        let times = transport.call_times.lock().unwrap();
        for pair in times.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(40));
        }
    }

    #[tokio::test]
    async fn rejects_body_without_signature() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.png");
        let transport = ScriptedTransport::new(vec![Ok(b"<html>rate limited</html>".to_vec())]);

        let result = Fetcher::new(transport.clone(), &config(2, Duration::from_millis(5)))
            .fetch("http://render.local/png/x", &dest)
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 2, "bad bodies are retried");
        assert!(!dest.exists(), "invalid body must not be written");
    }

    #[tokio::test]
    async fn signature_check_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.png");
        let transport = ScriptedTransport::new(vec![Ok(b"not a png".to_vec())]);
        let mut config = config(1, Duration::ZERO);
        config.validate_signature = false;

        let result = Fetcher::new(transport, &config)
            .fetch("http://render.local/png/x", &dest)
            .await;

        assert!(result.success);
        assert_eq!(std::fs::read(&dest).unwrap(), b"not a png");
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.png");
        std::fs::write(&dest, b"previous").unwrap();
        let transport = ScriptedTransport::new(vec![unavailable()]);

        let result = Fetcher::new(transport, &config(1, Duration::ZERO))
            .fetch("http://render.local/png/x", &dest)
            .await;

        assert!(!result.success);
        assert_eq!(std::fs::read(&dest).unwrap(), b"previous");
    }

    #[tokio::test]
    async fn success_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.png");
        std::fs::write(&dest, b"stale").unwrap();
        let transport = ScriptedTransport::new(vec![Ok(PNG.to_vec())]);

        let result = Fetcher::new(transport, &config(1, Duration::ZERO))
            .fetch("http://render.local/png/x", &dest)
            .await;

        assert!(result.success);
        assert_eq!(std::fs::read(&dest).unwrap(), PNG);
    }

    #[tokio::test]
    async fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("out").join("a.png");
        let transport = ScriptedTransport::new(vec![Ok(PNG.to_vec())]);

        let result = Fetcher::new(transport, &config(1, Duration::ZERO))
            .fetch("http://render.local/png/x", &dest)
            .await;

        assert!(result.success);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn write_error_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the output directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let dest = blocker.join("a.png");
        let transport = ScriptedTransport::new(vec![Ok(PNG.to_vec())]);

        let result = Fetcher::new(transport.clone(), &config(3, Duration::from_millis(5)))
            .fetch("http://render.local/png/x", &dest)
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
