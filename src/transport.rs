//! HTTP transport for render requests
//!
//! [`Transport`] is the seam between the fetcher and the network. Production
//! code uses [`HttpTransport`]; tests substitute an in-memory fake to count
//! calls or inject failures without a server.

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;

/// A single HTTP GET that yields the raw response body
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` and return the body
    ///
    /// # Errors
    ///
    /// - [`Error::Network`] on connect, timeout or body read failures
    /// - [`Error::HttpStatus`] when the server answers with a non-2xx status
    async fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// reqwest-backed transport
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client with the configured user agent and timeout
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "render server returned error status");
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}
