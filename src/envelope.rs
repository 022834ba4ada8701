//! Uniform response envelope returned by every API call.
//!
//! DESIGN
//! ======
//! The backend wraps payloads as `{ data, message, error, status, details,
//! timestamp }`. Every HTTP outcome, including transport failures, is
//! normalized into [`Envelope`] so callers only ever branch on `success`.
//!
//! INVARIANTS
//! ==========
//! - `success == true` implies `error == None`.
//! - `success == false` never carries `data`.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TIMEOUT_MESSAGE: &str = "request timed out";
pub const MALFORMED_BODY_MESSAGE: &str = "malformed response body";
pub const UNKNOWN_ERROR_MESSAGE: &str = "unknown error";

/// Outcome of one API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T = Value> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP status of the exchange; `None` when no response arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Field-level validation messages, keyed by field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl<T> Envelope<T> {
    /// Successful envelope.
    #[must_use]
    pub fn ok(data: Option<T>, message: Option<String>, status: Option<u16>) -> Self {
        Self { success: true, data, message, error: None, status, details: None, timestamp: None }
    }

    /// Failure envelope with no HTTP response behind it.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
            status: None,
            details: None,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn timed_out() -> Self {
        Self::failure(TIMEOUT_MESSAGE)
    }

    /// True when the backend answered 401.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }

    /// True for 5xx responses.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self.status, Some(500..=599))
    }

    /// Best human-readable explanation of a failure.
    #[must_use]
    pub fn error_message(&self) -> &str {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or(UNKNOWN_ERROR_MESSAGE)
    }

    /// Keep the metadata, replace the payload type. Failure envelopes stay empty.
    pub fn map_data<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            success: self.success,
            data: self.data.map(f),
            message: self.message,
            error: self.error,
            status: self.status,
            details: self.details,
            timestamp: self.timestamp,
        }
    }
}

impl Envelope<Value> {
    /// Normalize a raw HTTP exchange.
    ///
    /// 2xx bodies expose their `data` field when present, otherwise the whole
    /// body. Non-2xx bodies surface `error`, `message`, `details` and
    /// `timestamp` verbatim; `error` falls back to `HTTP <code>: <reason>`.
    #[must_use]
    pub fn from_http(status: u16, reason: &str, body: &str) -> Self {
        let parsed = if body.trim().is_empty() { Ok(Value::Null) } else { serde_json::from_str::<Value>(body) };

        if (200..300).contains(&status) {
            let Ok(value) = parsed else {
                let mut envelope = Self::failure(MALFORMED_BODY_MESSAGE);
                envelope.status = Some(status);
                return envelope;
            };
            let message = string_field(&value, "message");
            let timestamp = string_field(&value, "timestamp");
            let data = match value {
                Value::Object(mut map) if map.contains_key("data") => map.remove("data"),
                other => Some(other),
            }
            .filter(|data| !data.is_null());
            let mut envelope = Self::ok(data, message, Some(status));
            envelope.timestamp = timestamp;
            return envelope;
        }

        let value = parsed.unwrap_or(Value::Null);
        let error = string_field(&value, "error").unwrap_or_else(|| format!("HTTP {status}: {reason}"));
        Self {
            success: false,
            data: None,
            message: string_field(&value, "message"),
            error: Some(error),
            status: Some(status),
            details: details_field(&value),
            timestamp: string_field(&value, "timestamp"),
        }
    }

    /// Deserialize the payload into a typed value.
    ///
    /// A payload that does not match `U` turns the envelope into a failure.
    #[must_use]
    pub fn decode<U: DeserializeOwned>(self) -> Envelope<U> {
        let Self { success, data, message, error, status, details, timestamp } = self;
        match data.map(serde_json::from_value::<U>).transpose() {
            Ok(data) => Envelope { success, data, message, error, status, details, timestamp },
            Err(e) => Envelope {
                success: false,
                data: None,
                message,
                error: Some(format!("unexpected response shape: {e}")),
                status,
                details,
                timestamp,
            },
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(ToOwned::to_owned)
}

fn details_field(value: &Value) -> Option<BTreeMap<String, String>> {
    let map = value.get("details")?.as_object()?;
    Some(
        map.iter()
            .map(|(field, message)| {
                let text = message.as_str().map_or_else(|| message.to_string(), ToOwned::to_owned);
                (field.clone(), text)
            })
            .collect(),
    )
}

#[cfg(test)]
#[path = "envelope_test.rs"]
mod tests;
