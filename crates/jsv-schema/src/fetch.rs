//! Remote schema downloads.
//!
//! [`SchemaFetcher`] is the seam between schema resolution and the network.
//! [`HttpFetcher`] is the production implementation; tests substitute
//! in-memory fetchers.

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::AppConfig;

/// Error downloading a remote resource.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    #[error("cannot build HTTP client: {0}")]
    Client(String),

    /// The request failed before a response was received.
    #[error("request to {url} failed: {reason}")]
    Request {
        /// Requested URL.
        url: String,
        /// Transport error.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("request to {url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The URL scheme is not fetchable.
    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),
}

/// Downloads the bytes of a remote resource.
pub trait SchemaFetcher: Send + Sync {
    /// Fetch `url` and return the response body.
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP fetcher honouring the configured proxy and timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Create a fetcher from the application configuration.
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        Self::with_settings(config.proxy_url.as_ref(), config.fetch_timeout)
    }

    /// Create a fetcher with an explicit proxy and timeout.
    pub fn with_settings(proxy: Option<&Url>, timeout: Duration) -> Result<Self, FetchError> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("jsv/", env!("CARGO_PKG_VERSION")));
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| FetchError::Client(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { http })
    }
}

impl SchemaFetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }
        tracing::debug!(url = %url, "downloading remote schema");
        let response = self
            .http
            .get(url.clone())
            .send()
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_proxy() {
        let proxy = Url::parse("http://proxy.local:3128").unwrap();
        assert!(HttpFetcher::with_settings(Some(&proxy), Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        let fetcher = HttpFetcher::with_settings(None, Duration::from_secs(5)).unwrap();
        let url = Url::parse("ftp://example.org/schema.json").unwrap();
        assert!(matches!(
            fetcher.fetch(&url),
            Err(FetchError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
    }
}
