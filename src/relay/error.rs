//! Relay failures and their HTTP rendering.
//!
//! Every failure except validation is answered with a JSON `{"error": …}`
//! body, so front-ends only ever need one decoding path.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use tracing::error;

use crate::api::ErrorBody;

/// How deep an `error` string holding serialized JSON is unwrapped.
const MAX_NESTED_ERROR_DEPTH: usize = 2;

#[derive(Debug)]
pub enum RelayError {
    /// The request carried no usable `message`.
    Validation,
    /// No response could be obtained from the upstream at all.
    BackendUnreachable {
        url: String,
        source: reqwest::Error,
    },
    /// The upstream answered with a non-success status.
    Backend { status: StatusCode, message: String },
    /// Anything else; details are logged and never sent to the client.
    Internal(String),
}

impl RelayError {
    /// Classifies a failed outbound request. Connection failures and
    /// timeouts mean the upstream is unreachable; the rest are internal.
    pub fn from_send_error(err: reqwest::Error, url: &str) -> Self {
        if err.is_connect() || err.is_timeout() {
            RelayError::BackendUnreachable {
                url: url.to_string(),
                source: err,
            }
        } else {
            RelayError::Internal(format!("Request to {url} failed: {err}"))
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Validation => StatusCode::BAD_REQUEST,
            RelayError::BackendUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Backend { status, .. } => *status,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Validation => write!(f, "Message is required"),
            RelayError::BackendUnreachable { url, .. } => write!(
                f,
                "Unable to reach the chat backend at {url}. Verify that the backend is running at the configured URL."
            ),
            RelayError::Backend { message, .. } => write!(f, "{message}"),
            RelayError::Internal(details) => write!(f, "Internal error: {details}"),
        }
    }
}

impl StdError for RelayError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RelayError::BackendUnreachable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            RelayError::Validation => (status, "Message is required").into_response(),
            RelayError::Internal(details) => {
                error!(%details, "Relay request failed");
                (status, Json(ErrorBody::new("Internal server error"))).into_response()
            }
            other => (status, Json(ErrorBody::new(other.to_string()))).into_response(),
        }
    }
}

/// Turns an upstream error body into one readable line. The first extractor
/// that yields something wins, ending with a generic status message.
pub fn extract_backend_error(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json_error_message(&value, 0) {
            return message;
        }
    }

    let text = collapse_whitespace(body);
    if !text.is_empty() {
        return text;
    }

    format!("Backend request failed with status {}", status.as_u16())
}

fn json_error_message(value: &Value, depth: usize) -> Option<String> {
    if !value.is_object() {
        return None;
    }
    detail_message(value)
        .or_else(|| error_field_message(value, depth))
        .or_else(|| value.get("message").and_then(Value::as_str).and_then(non_blank))
}

/// FastAPI-style `detail`: a string, or a list of validation errors.
fn detail_message(value: &Value) -> Option<String> {
    match value.get("detail")? {
        Value::String(text) => non_blank(text),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.get("msg").and_then(Value::as_str).and_then(non_blank)),
        _ => None,
    }
}

fn error_field_message(value: &Value, depth: usize) -> Option<String> {
    match value.get("error")? {
        Value::String(text) => {
            if depth < MAX_NESTED_ERROR_DEPTH {
                if let Ok(nested) = serde_json::from_str::<Value>(text) {
                    if let Some(message) = json_error_message(&nested, depth + 1) {
                        return Some(message);
                    }
                }
            }
            non_blank(text)
        }
        Value::Object(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .and_then(non_blank),
        _ => None,
    }
}

fn non_blank(text: &str) -> Option<String> {
    let text = collapse_whitespace(text);
    (!text.is_empty()).then_some(text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
