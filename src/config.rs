//! Configuration types for diagram-dl
//!
//! Every field carries a serde default, so an empty JSON object (`{}`) is a
//! valid configuration that reproduces the stock behavior: PNG output into
//! `./diagrams`, three attempts per diagram with a fixed three second pause,
//! and two seconds between diagrams.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, path::PathBuf, str::FromStr, time::Duration};

/// Image format requested from the render server
///
/// The lowercase name doubles as the URL path segment and the file extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG raster image (default)
    #[default]
    Png,
    /// SVG vector image
    Svg,
    /// ASCII-art text rendering
    Txt,
}

impl OutputFormat {
    /// URL path segment and file extension for this format
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
            OutputFormat::Txt => "txt",
        }
    }

    /// Checks that `body` plausibly holds an image of this format
    ///
    /// Returns the reason on mismatch. Text output has no signature and always passes.
    pub fn check_signature(&self, body: &[u8]) -> std::result::Result<(), String> {
        match self {
            OutputFormat::Png => {
                const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
                if body.starts_with(PNG_MAGIC) {
                    Ok(())
                } else {
                    Err("missing PNG signature".to_string())
                }
            }
            OutputFormat::Svg => {
                if body.windows(4).any(|w| w == b"<svg") {
                    Ok(())
                } else {
                    Err("no <svg> element in body".to_string())
                }
            }
            OutputFormat::Txt => Ok(()),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "svg" => Ok(OutputFormat::Svg),
            "txt" => Ok(OutputFormat::Txt),
            other => Err(Error::config(
                "format",
                format!("unknown output format '{other}' (expected png, svg or txt)"),
            )),
        }
    }
}

/// HTTP client settings for the render server
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    ///
    /// The public PlantUML server rejects some default library agents, so a
    /// browser-like value is used unless overridden.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

/// Retry behavior for render requests
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts per diagram, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt (default: 3 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Upper bound for the delay between attempts (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 1.0, fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// How a previously written artifact is recognised as complete
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStrategy {
    /// File exists and is larger than `min_size_bytes`
    #[default]
    MinSize,
    /// A `.done` sidecar holds a SHA-256 that matches the file contents
    Checksum,
}

/// Completion cache settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Which completion check to use
    #[serde(default)]
    pub strategy: CompletionStrategy,

    /// Size an artifact must exceed to count as complete under `min_size` (default: 1000)
    #[serde(default = "default_min_size_bytes")]
    pub min_size_bytes: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            strategy: CompletionStrategy::default(),
            min_size_bytes: default_min_size_bytes(),
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Render server base URL, without the format segment
    /// (default: "https://www.plantuml.com/plantuml")
    #[serde(default = "default_render_base_url")]
    pub render_base_url: String,

    /// Directory artifacts are written to (default: "./diagrams")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Requested image format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pause between consecutive diagrams (default: 2000 ms)
    #[serde(
        rename = "request_delay_ms",
        default = "default_request_delay",
        with = "millis_serde"
    )]
    pub request_delay: Duration,

    /// Reject response bodies that do not carry the format's signature (default: true)
    #[serde(default = "default_true")]
    pub validate_signature: bool,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Completion cache settings
    #[serde(default)]
    pub completion: CompletionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            render_base_url: default_render_base_url(),
            output_dir: default_output_dir(),
            format: OutputFormat::default(),
            request_delay: default_request_delay(),
            validate_signature: true,
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
            completion: CompletionConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file and validate it
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read config file {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.render_base_url).map_err(|e| {
            Error::config(
                "render_base_url",
                format!("invalid URL '{}': {}", self.render_base_url, e),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(
                "render_base_url",
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "retry.max_attempts",
                "must allow at least one attempt",
            ));
        }
        if !(self.retry.backoff_multiplier.is_finite() && self.retry.backoff_multiplier >= 1.0) {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "must be a finite number >= 1.0",
            ));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(Error::config("http.user_agent", "must not be empty"));
        }
        Ok(())
    }

    /// Path of the artifact for a diagram name
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", name, self.format))
    }

    /// Render URL for an already-encoded token
    pub fn render_url(&self, token: &str) -> String {
        format!(
            "{}/{}/{}",
            self.render_base_url.trim_end_matches('/'),
            self.format,
            token
        )
    }
}

fn default_render_base_url() -> String {
    "https://www.plantuml.com/plantuml".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("diagrams")
}

fn default_request_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_min_size_bytes() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.render_base_url, "https://www.plantuml.com/plantuml");
        assert_eq!(config.output_dir, PathBuf::from("diagrams"));
        assert_eq!(config.format, OutputFormat::Png);
        assert_eq!(config.request_delay, Duration::from_secs(2));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(3));
        assert_eq!(config.retry.backoff_multiplier, 1.0);
        assert!(!config.retry.jitter);
        assert_eq!(config.completion.strategy, CompletionStrategy::MinSize);
        assert_eq!(config.completion.min_size_bytes, 1000);
        assert_eq!(config.http.timeout, Duration::from_secs(30));
        assert!(config.validate_signature);
        config.validate().unwrap();
    }

    #[test]
    fn nested_overrides_are_applied() {
        let json = r#"{
            "render_base_url": "http://localhost:8080/plantuml/",
            "format": "svg",
            "request_delay_ms": 250,
            "retry": { "max_attempts": 5, "initial_delay": 1, "backoff_multiplier": 2.0 },
            "completion": { "strategy": "checksum" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.format, OutputFormat::Svg);
        assert_eq!(config.request_delay, Duration::from_millis(250));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(config.retry.max_delay, Duration::from_secs(60));
        assert_eq!(config.completion.strategy, CompletionStrategy::Checksum);
        assert_eq!(config.completion.min_size_bytes, 1000);
    }

    #[test]
    fn render_url_trims_trailing_slash() {
        let config = Config {
            render_base_url: "http://localhost:8080/plantuml/".to_string(),
            format: OutputFormat::Svg,
            ..Default::default()
        };
        assert_eq!(
            config.render_url("SyfFKj2rKt3CoKnELR1Io4ZDoSa70000"),
            "http://localhost:8080/plantuml/svg/SyfFKj2rKt3CoKnELR1Io4ZDoSa70000"
        );
    }

    #[test]
    fn artifact_path_uses_format_extension() {
        let config = Config {
            output_dir: PathBuf::from("/tmp/out"),
            ..Default::default()
        };
        assert_eq!(
            config.artifact_path("01_Overview"),
            PathBuf::from("/tmp/out/01_Overview.png")
        );
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;

        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, Error::Config { key: Some(ref k), .. } if k == "retry.max_attempts"),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let config = Config {
            render_base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            render_base_url: "ftp://example.com/plantuml".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_shrinking_backoff() {
        let mut config = Config::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("svg".parse::<OutputFormat>().unwrap(), OutputFormat::Svg);
        assert!("bmp".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn png_signature_check() {
        assert!(
            OutputFormat::Png
                .check_signature(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR")
                .is_ok()
        );
        assert!(OutputFormat::Png.check_signature(b"<html>busy</html>").is_err());
        assert!(OutputFormat::Png.check_signature(b"").is_err());
    }

    #[test]
    fn svg_and_txt_signature_check() {
        assert!(
            OutputFormat::Svg
                .check_signature(br#"<?xml version="1.0"?><svg xmlns="x"></svg>"#)
                .is_ok()
        );
        assert!(OutputFormat::Svg.check_signature(b"\x89PNG").is_err());
        assert!(OutputFormat::Txt.check_signature(b"anything").is_ok());
    }

    #[test]
    fn from_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "retry": { "max_attempts": 0 } }"#).unwrap();
        assert!(Config::from_file(&path).is_err());

        std::fs::write(&path, r#"{ "output_dir": "out" }"#).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));

        assert!(Config::from_file(&dir.path().join("missing.json")).is_err());
    }
}
