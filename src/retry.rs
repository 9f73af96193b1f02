//! Retry logic with configurable backoff
//!
//! The render server is a shared public service that throttles and times out
//! under load. [`retry_with_backoff`] wraps any async fallible operation with a
//! bounded number of attempts and a pause between them. With the default
//! multiplier of 1.0 the pause is fixed; larger multipliers give exponential
//! backoff capped at `max_delay`.
//!
//! # Example
//!
//! ```no_run
//! use diagram_dl::retry::{IsRetryable, retry_with_backoff};
//! use diagram_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let value = retry_with_backoff(&config, |attempt| async move {
//!     println!("attempt {attempt}");
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, throttling, connection reset) return `true`.
/// Permanent failures (bad configuration, disk full) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Anything that went wrong on the wire is worth another try,
            // except a request that could not even be built
            Error::Network(e) => !e.is_builder(),
            // Throttling, 5xx and the occasional spurious 4xx from the public server
            Error::HttpStatus { .. } => true,
            // An HTML error page instead of an image
            Error::InvalidArtifact { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. } => false,
            Error::Marker { .. } => false,
            Error::Serialization(_) => false,
        }
    }
}

/// Execute an async operation, retrying transient failures
///
/// `operation` receives the 1-based attempt number. It runs at most
/// `config.max_attempts` times in total (a value of 0 is treated as 1). There
/// is no pause after the final attempt.
///
/// # Returns
///
/// The first successful result, or the last error once attempts are exhausted
/// or a non-retryable error occurs.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    let mut delay = config.initial_delay;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let wait = if config.jitter { add_jitter(delay) } else { delay };

                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = wait.as_millis(),
                    "attempt failed, retrying"
                );

                tokio::time::sleep(wait).await;

                delay = next_delay(delay, config);
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "operation failed after all attempts exhausted"
                    );
                } else {
                    tracing::error!(
                        error = %e,
                        attempt,
                        "operation failed with non-retryable error"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Grow `delay` by the multiplier, capped at `max_delay`
///
/// A product too large for a [`Duration`] saturates to `max_delay`.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`, or is `delay` itself when
/// doubling would overflow.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
