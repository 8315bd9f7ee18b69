//! Normalized client errors.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures and non-2xx responses are folded into a single
//! [`RequestError`] before leaving the executor. Everything else a command
//! can fail on (bad input, token storage, a success body that is not JSON)
//! has its own [`ClientError`] variant so the renderer can show one uniform
//! `Error:` block.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use serde_json::Value;

use crate::state::storage::StorageError;

/// Payload captured from a failed response.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    /// The response declared JSON and parsed as JSON.
    Json(Value),
    /// Raw body text, either declared as non-JSON or failing to parse.
    Text(String),
}

impl ErrorBody {
    /// `true` for an empty text body or a JSON `null`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Json(value) => value.is_null(),
            Self::Text(text) => text.is_empty(),
        }
    }

    /// Pretty-printed JSON, or the raw text unchanged.
    #[must_use]
    pub fn to_pretty(&self) -> String {
        match self {
            Self::Json(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
            Self::Text(text) => text.clone(),
        }
    }
}

/// A failed request: either no response at all (`status` is `None`) or a
/// non-2xx response with whatever body could be classified.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct RequestError {
    pub status: Option<u16>,
    pub message: String,
    pub body: Option<ErrorBody>,
}

impl RequestError {
    /// No response was obtained (DNS, refused connection, reset stream).
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into(), body: None }
    }

    /// The server answered with a non-2xx status.
    #[must_use]
    pub fn http(status: u16, body: Option<ErrorBody>) -> Self {
        Self { status: Some(status), message: http_error_message(status), body }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

pub(crate) fn http_error_message(status: u16) -> String {
    format!("HTTP error! Status: {status}")
}

/// Every failure a client operation can surface.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure or non-2xx response.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Required input was missing or unusable; no request was sent.
    #[error("{0}")]
    Validation(String),

    /// Caller-supplied JSON text could not be used as a request body.
    #[error("invalid JSON payload: {0}")]
    MalformedPayload(String),

    /// A 2xx response carried a body that is not JSON.
    #[error("response body was not valid JSON: {0}")]
    InvalidSuccessBody(String),

    /// A successful login response had no usable `token` field.
    #[error("Login response did not contain a token.")]
    MissingToken,

    /// The persisted token could not be read or written.
    #[error("token storage failed: {0}")]
    Storage(#[from] StorageError),

    /// A header (usually the bearer token) is not a legal header value.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// The HTTP client itself could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ClientError {
    /// The underlying request error, if this failure came off the wire.
    #[must_use]
    pub fn as_request(&self) -> Option<&RequestError> {
        match self {
            Self::Request(error) => Some(error),
            _ => None,
        }
    }
}
