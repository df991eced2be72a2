//! The HTTP capability the client is built on.
//!
//! The client never talks to the network directly: it hands a
//! [`RequestMetadata`] to a [`Transport`] and gets a [`RawResponse`] back.
//! [`HttpTransport`] is the reqwest-backed implementation; tests and callers
//! with special needs can plug in their own.

use crate::{metadata::RequestMetadata, response::RawResponse, Error, Result};
use async_trait::async_trait;
use http::{HeaderMap, Method};
use std::time::{Duration, Instant};
use url::Url;

/// Issues one request and returns the status and body.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status. `Err` is reserved for failures where no response
/// exists (network, timeout, invalid request).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a single request.
    async fn send(&self, request: RequestMetadata) -> Result<RawResponse>;
}

/// A [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: Url,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a transport rooted at `base_url`.
    ///
    /// Request paths are resolved relative to the base URL, so a base of
    /// `https://api.petfinder.com/v2/` and a path of `animals` yields
    /// `https://api.petfinder.com/v2/animals`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: Url, default_headers: HeaderMap, timeout: Option<Duration>) -> Result<Self> {
        let http_client = reqwest::Client::builder().build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            http_client,
            base_url: with_trailing_slash(base_url),
            default_headers,
            timeout,
        })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, request: &RequestMetadata) -> Result<Url> {
        let mut url = self.base_url.join(&request.path)?;
        if !request.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query_params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: RequestMetadata) -> Result<RawResponse> {
        let url = self.url_for(&request)?;

        tracing::debug!(
            method = %request.method,
            url = %url,
            "Executing HTTP request"
        );

        let mut builder = self.http_client.request(request.method.clone(), url);

        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if request.method == Method::POST && !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let start_time = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let raw_body = response.text().await?;
        let latency = start_time.elapsed();

        tracing::debug!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            path = %request.path,
            "Received HTTP response"
        );

        Ok(RawResponse::new(status, headers, raw_body, latency))
    }
}

/// Ensures relative joins keep the last path segment of the base URL.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
