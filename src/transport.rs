//! Raw HTTP exchange behind the executor.
//!
//! `Transport` is the seam between request building/normalization and the
//! network. Production uses [`ReqwestTransport`]; tests script the backend.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Fully built request: absolute URL, final headers, JSON body.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Bearer token carried by the request, if any.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }
}

/// Raw response: status line and undecoded body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

// =============================================================================
// REQWEST
// =============================================================================

/// `reqwest` transport with a cookie store, so the backend's refresh cookie is
/// replayed on the reissue call.
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::with_connect_timeout(config.connect_timeout)
    }

    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers);
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_owned(),
            body,
        })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(error.to_string())
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
