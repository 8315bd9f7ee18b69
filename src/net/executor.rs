//! Authenticated request executor.
//!
//! DESIGN
//! ======
//! Every API call goes through [`RequestExecutor::execute`]. It adds the
//! bearer token when one is held, sends the request exactly once, and turns
//! whatever comes back into either a JSON value or a [`RequestError`].
//! There is no retry and no client-side timeout.
//!
//! Body classification lives in free functions so it can be exercised
//! without a server.

#[cfg(test)]
#[path = "executor_test.rs"]
mod executor_test;

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use super::error::{ClientError, ErrorBody, RequestError};
use crate::state::auth::AuthState;

pub const NO_CONTENT_MESSAGE: &str = "Operation successful (No Content)";

// =============================================================================
// OPTIONS
// =============================================================================

/// Per-request configuration: method, extra headers, optional JSON body and
/// whether the held bearer token should be attached.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub authenticated: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self { method, headers: HeaderMap::new(), body: None, authenticated: true }
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

    /// Attach a JSON body and declare it with `Content-Type: application/json`.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Never attach the held token (used by login).
    #[must_use]
    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

pub struct RequestExecutor {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<AuthState>,
}

impl RequestExecutor {
    /// Build an executor rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str, auth: Arc<AuthState>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::HttpClientBuild(e.to_string()))?;
        Ok(Self::with_client(http, base_url, auth))
    }

    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: &str, auth: Arc<AuthState>) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_owned(), auth }
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<AuthState> {
        &self.auth
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve `path` against the base URL. Absolute URLs pass through.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_owned();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Caller headers plus `Authorization: Bearer <token>` when a token is
    /// held, the request is authenticated, and the caller set none.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a legal header value.
    pub fn merged_headers(&self, options: &RequestOptions) -> Result<HeaderMap, ClientError> {
        let mut headers = options.headers.clone();
        if !options.authenticated || headers.contains_key(AUTHORIZATION) {
            return Ok(headers);
        }
        if let Some(token) = self.auth.token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Send one request and normalize the outcome.
    ///
    /// - 204: synthetic `{status, message}` value, body not read.
    /// - other 2xx: body parsed as JSON.
    /// - non-2xx: [`RequestError`] with the classified body.
    /// - no response: [`RequestError`] without a status.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`] for transport and HTTP failures and
    /// [`ClientError::InvalidSuccessBody`] when a 2xx body is not JSON.
    pub async fn execute(&self, path: &str, options: RequestOptions) -> Result<Value, ClientError> {
        let url = self.url(path);
        let headers = self.merged_headers(&options)?;
        let method = options.method;

        let mut request = self.http.request(method.clone(), &url).headers(headers);
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        tracing::debug!(%method, %url, "request sent");
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%method, %url, error = %e, "request failed before a response");
                return Err(RequestError::transport(e.to_string()).into());
            }
        };

        let status = response.status();
        if status.as_u16() == 204 {
            tracing::debug!(%method, %url, "request succeeded with no content");
            return Ok(no_content_value());
        }

        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| RequestError::transport(e.to_string()))?;
            tracing::debug!(%method, %url, status = status.as_u16(), "request succeeded");
            return parse_success_body(&bytes);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = match response.bytes().await {
            Ok(bytes) => Some(classify_error_body(content_type.as_deref(), &bytes)),
            Err(e) => {
                tracing::warn!(%url, error = %e, "could not read error response body");
                None
            }
        };
        tracing::debug!(%method, %url, status = status.as_u16(), "request failed");
        Err(RequestError::http(status.as_u16(), body).into())
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Value returned for `204 No Content`.
#[must_use]
pub fn no_content_value() -> Value {
    serde_json::json!({ "status": 204, "message": NO_CONTENT_MESSAGE })
}

pub(crate) fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
}

/// Classify a non-2xx body: JSON when declared and parseable, raw text
/// otherwise.
pub(crate) fn classify_error_body(content_type: Option<&str>, bytes: &[u8]) -> ErrorBody {
    if is_json_content_type(content_type) {
        if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
            return ErrorBody::Json(value);
        }
    }
    ErrorBody::Text(String::from_utf8_lossy(bytes).into_owned())
}

pub(crate) fn parse_success_body(bytes: &[u8]) -> Result<Value, ClientError> {
    serde_json::from_slice(bytes).map_err(|e| ClientError::InvalidSuccessBody(e.to_string()))
}
