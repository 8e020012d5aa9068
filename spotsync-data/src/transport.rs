//! Byte fetching shared by feed downloads and image downloads.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use thiserror::Error;

/// Default user agent for outbound requests.
pub const DEFAULT_USER_AGENT: &str = "spotsync/0.1";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Transport-level errors encountered while issuing HTTP requests.
///
/// These are transient from the pipeline's point of view: callers retry at
/// their own level, nothing here retries automatically.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The server returned an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Fully qualified request URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// Connection, TLS, or body streaming failure.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// Error description reported by the transport.
        message: String,
    },
}

/// Errors detected while constructing external-service adapters.
///
/// Raised before any I/O is attempted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// A required credential was not configured.
    #[error("missing credential: {name}")]
    MissingCredential {
        /// Name of the missing setting.
        name: &'static str,
    },
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    HttpClient {
        /// Error returned by `reqwest`.
        #[source]
        source: reqwest::Error,
    },
}

/// Downloads the body of a URL.
#[async_trait(?Send)]
pub trait Fetcher {
    /// Fetch the complete response body.
    async fn fetch(&self, url: &str) -> Result<Bytes, TransportError>;
}

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpFetcherConfig {
    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: HttpFetcherConfig,
}

impl HttpFetcher {
    /// Build a fetcher with explicit configuration.
    pub fn with_config(config: HttpFetcherConfig) -> Result<Self, ConfigurationError> {
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|source| ConfigurationError::HttpClient { source })?;
        Ok(Self { client, config })
    }
}

#[async_trait(?Send)]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, TransportError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.config.user_agent.as_str())
            .send()
            .await
            .map_err(|err| convert_reqwest_error(&err, url, self.config.timeout))?
            .error_for_status()
            .map_err(|err| convert_reqwest_error(&err, url, self.config.timeout))?;
        response
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(&err, url, self.config.timeout))
    }
}

/// Map a `reqwest` failure onto the transport taxonomy.
pub(crate) fn convert_reqwest_error(
    error: &reqwest::Error,
    url: &str,
    timeout: Duration,
) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout {
            url: url.to_owned(),
            timeout_secs: timeout.as_secs(),
        };
    }

    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    TransportError::Network {
        url: url.to_owned(),
        message: error.to_string(),
    }
}
