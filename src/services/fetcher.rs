//! Page fetching for Open Graph scraping.
//!
//! The fetcher performs exactly one GET per call. Retrying is the
//! processor's job, so every transport failure collapses into a single
//! `FetchError` carrying a readable message.

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::{error::Error as _, time::Duration};
use thiserror::Error;
use tracing::debug;

/// Hard upper bound for a single page fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("HTTP request failed: {message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// reqwest keeps the useful part (refused, DNS, timeout) in the `source()`
/// chain, so every level is joined into the message.
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        FetchError::new(message)
    }
}

/// Retrieves the raw HTML for a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// `Fetcher` backed by a shared `reqwest::Client` that presents itself as a browser.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

        // Accept-Encoding is negotiated by reqwest itself so bodies get decompressed.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Non-2xx responses still carry a page worth scraping, so only transport
    /// failures (refused, DNS, timeout, broken body) are errors here.
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        debug!(url, status = %response.status(), "fetched page");
        Ok(response.text().await?)
    }
}
