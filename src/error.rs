//! Client errors that escape as `Err`.
//!
//! ERROR HANDLING
//! ==============
//! HTTP-layer failures (timeouts, connect errors, non-2xx, unparseable bodies)
//! never show up here: they are folded into a failure [`crate::Envelope`].
//! What remains are mistakes in the calling code and construction failures.

/// Errors produced by client construction and malformed calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Config(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// Endpoints are relative paths and must start with `/`.
    #[error("invalid endpoint `{0}`: expected a path starting with '/'")]
    InvalidEndpoint(String),

    /// A caller-supplied header name or value is not valid HTTP.
    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },

    /// The request body could not be encoded as JSON.
    #[error("request body serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The persisted session blob could not be read or written.
    #[error("session store failed: {0}")]
    SessionStore(String),
}
