//! Page fetch collaborator
//!
//! The crawl engine only needs "give me the rendered page at this URL, or
//! tell me what kind of failure happened". This module defines that contract
//! and an HTTP implementation of it.
//!
//! Failures carry a typed [`FetchErrorKind`] decided by the fetcher itself,
//! so the retry policy never has to inspect error message text.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; relative links resolve against this
    pub url: Url,

    /// Page body content
    pub body: String,
}

/// Classification of a fetch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// The request did not complete within the fetch timeout
    Timeout,

    /// The server answered 404
    NotFound,

    /// The connection could not be established or was dropped mid-response
    ConnectionClosed,

    /// Anything else, including non-404 error statuses
    Other,
}

impl FetchErrorKind {
    /// Returns true if retrying the same fetch may succeed
    ///
    /// Unclassified failures are terminal.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::NotFound | Self::ConnectionClosed)
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::NotFound => "not found",
            Self::ConnectionClosed => "connection closed",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// A failed fetch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch of {url} failed ({kind}): {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: &Url, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.to_string(),
            message: message.into(),
        }
    }

    /// Returns true if retrying the same fetch may succeed
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Fetches rendered page content
///
/// Implementations must bound each call in time; the crawl engine never
/// cancels a fetch itself.
#[async_trait]
pub trait PageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration (user agent and fetch timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.value.clone())
        .timeout(Duration::from_secs(config.crawler.fetch_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP implementation of [`PageFetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

/// Maps a transport-level reqwest error to a fetch failure kind
fn classify_reqwest_error(e: &reqwest::Error) -> FetchErrorKind {
    if e.is_timeout() {
        FetchErrorKind::Timeout
    } else if e.is_connect() || e.is_body() || e.is_request() {
        FetchErrorKind::ConnectionClosed
    } else {
        FetchErrorKind::Other
    }
}

/// Maps a non-success HTTP status to a fetch failure kind
fn classify_status(status: StatusCode) -> FetchErrorKind {
    if status == StatusCode::NOT_FOUND {
        FetchErrorKind::NotFound
    } else {
        FetchErrorKind::Other
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            FetchError::new(classify_reqwest_error(&e), url, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                classify_status(status),
                url,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| {
            FetchError::new(classify_reqwest_error(&e), url, e.to_string())
        })?;

        tracing::trace!(url = %final_url, bytes = body.len(), "Fetched page");

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }
}
