//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;
use crate::navigation::HOME_ROUTE;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8081";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL without a trailing slash.
    pub base_url: String,
    /// Default timeout applied to each request when the caller sets none.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Route the user lands on after login and forced logout.
    pub landing_route: String,
    /// Location of the persisted session blob, if any.
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_owned(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            landing_route: HOME_ROUTE.to_owned(),
            session_file: None,
        }
    }
}

impl ClientConfig {
    /// Build a config for the given backend URL with every other field defaulted.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the URL is not `http(s)://`.
    pub fn with_base_url(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self { base_url: normalize_base_url(base_url)?, ..Self::default() })
    }

    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `STOREFRONT_API_BASE_URL`: default `http://localhost:8081`
    /// - `STOREFRONT_REQUEST_TIMEOUT_MS`: default 10000
    /// - `STOREFRONT_CONNECT_TIMEOUT_SECS`: default 10
    /// - `STOREFRONT_LANDING_ROUTE`: default `/`
    /// - `STOREFRONT_SESSION_FILE`: no default
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the base URL is malformed.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var("STOREFRONT_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_owned());
        let base_url = normalize_base_url(&base_url)?;
        let request_timeout =
            Duration::from_millis(env_parse_u64("STOREFRONT_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS));
        let connect_timeout =
            Duration::from_secs(env_parse_u64("STOREFRONT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS));
        let landing_route = std::env::var("STOREFRONT_LANDING_ROUTE")
            .ok()
            .filter(|route| route.starts_with('/'))
            .unwrap_or_else(|| HOME_ROUTE.to_owned());
        let session_file = std::env::var_os("STOREFRONT_SESSION_FILE").map(PathBuf::from);

        Ok(Self { base_url, request_timeout, connect_timeout, landing_route, session_file })
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn normalize_base_url(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ClientError::Config(format!("STOREFRONT_API_BASE_URL must be http(s): {raw}")));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
