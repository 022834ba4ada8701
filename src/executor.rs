//! HTTP request executor.
//!
//! ARCHITECTURE
//! ============
//! Builds one request (URL, method, headers, JSON body), attaches the bearer
//! token from [`SessionState`], runs the exchange under a timeout, and
//! normalizes whatever happened into an [`Envelope`]. It performs exactly one
//! exchange per call and never touches the session; 401 recovery belongs to
//! the refresh coordinator.
//!
//! ERROR HANDLING
//! ==============
//! Only caller mistakes (bad endpoint, bad header) come back as `Err`.
//! Timeouts, connect failures and bad bodies are failure envelopes.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::envelope::Envelope;
use crate::error::ClientError;
use crate::session::SessionState;
use crate::transport::{HttpRequest, Transport, TransportError};

// =============================================================================
// OPTIONS
// =============================================================================

/// Per-call request options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Header overrides, applied over the defaults.
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Falls back to the configured default when `None`.
    pub timeout: Option<Duration>,
    /// Send without a bearer token. Such requests never trigger a refresh.
    pub skip_auth_attach: bool,
    /// Attach the token but surface a 401 as-is instead of refreshing.
    pub skip_auth_refresh: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            timeout: None,
            skip_auth_attach: false,
            skip_auth_refresh: false,
        }
    }

    #[must_use]
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    #[must_use]
    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    #[must_use]
    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    #[must_use]
    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    #[must_use]
    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn skip_auth_attach(mut self) -> Self {
        self.skip_auth_attach = true;
        self
    }

    #[must_use]
    pub fn skip_auth_refresh(mut self) -> Self {
        self.skip_auth_refresh = true;
        self
    }

    /// Whether a 401 on this request may be recovered by refresh and replay.
    #[must_use]
    pub fn refresh_eligible(&self) -> bool {
        !self.skip_auth_attach && !self.skip_auth_refresh
    }
}

/// Position of an exchange within one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    /// The single replay after a successful refresh.
    Replay,
}

impl Attempt {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Replay => "replay",
        }
    }
}

/// One finished exchange plus the token it was sent with.
#[derive(Debug, Clone)]
pub struct Sent {
    pub envelope: Envelope,
    pub token: Option<String>,
}

// =============================================================================
// EXECUTOR
// =============================================================================

pub struct Executor {
    transport: Arc<dyn Transport>,
    session: Arc<SessionState>,
    base_url: String,
    default_headers: HeaderMap,
    default_timeout: Duration,
}

impl Executor {
    #[must_use]
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>, session: Arc<SessionState>) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            transport,
            session,
            base_url: config.base_url.clone(),
            default_headers,
            default_timeout: config.request_timeout,
        }
    }

    /// Execute one request and normalize the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error only for malformed calls: an endpoint that is not an
    /// absolute path, or a header that is not valid HTTP.
    pub async fn execute(&self, endpoint: &str, options: &RequestOptions) -> Result<Envelope, ClientError> {
        Ok(self.send_once(endpoint, options, Attempt::Initial).await?.envelope)
    }

    /// Single exchange; reports which token was attached so a 401 can be
    /// matched against later rotations.
    ///
    /// # Errors
    ///
    /// Same as [`Executor::execute`].
    pub async fn send_once(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        attempt: Attempt,
    ) -> Result<Sent, ClientError> {
        let url = self.build_url(endpoint, &options.query)?;
        let mut headers = self.build_headers(&options.headers)?;

        let token = if options.skip_auth_attach { None } else { self.session.access_token() };
        let token = token.and_then(|token| match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
                Some(token)
            }
            Err(_) => {
                tracing::warn!("stored access token is not a valid header value; sending unauthenticated");
                None
            }
        });

        let request = HttpRequest { method: options.method.clone(), url, headers, body: options.body.clone() };
        let timeout = options.timeout.unwrap_or(self.default_timeout);

        tracing::debug!(
            method = %options.method,
            %endpoint,
            attempt = attempt.as_str(),
            authenticated = token.is_some(),
            "request"
        );

        let envelope = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Err(_) | Ok(Err(TransportError::Timeout)) => {
                tracing::warn!(%endpoint, timeout_ms = %timeout.as_millis(), "request timed out");
                Envelope::timed_out()
            }
            Ok(Err(TransportError::Network(message))) => {
                tracing::warn!(%endpoint, error = %message, "request failed");
                Envelope::failure(format!("network error: {message}"))
            }
            Ok(Ok(response)) => {
                tracing::debug!(%endpoint, status = response.status, "response");
                Envelope::from_http(response.status, &response.reason, &response.body)
            }
        };

        Ok(Sent { envelope, token })
    }

    fn build_url(&self, endpoint: &str, query: &[(String, String)]) -> Result<Url, ClientError> {
        if !endpoint.starts_with('/') {
            return Err(ClientError::InvalidEndpoint(endpoint.to_owned()));
        }
        let mut url = Url::parse(&format!("{}{endpoint}", self.base_url))
            .map_err(|_| ClientError::InvalidEndpoint(endpoint.to_owned()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn build_headers(&self, overrides: &[(String, String)]) -> Result<HeaderMap, ClientError> {
        let mut headers = self.default_headers.clone();
        for (name, value) in overrides {
            let invalid = || ClientError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
