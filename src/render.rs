//! Terminal rendering for results, errors and auth status.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use serde_json::Value;

use crate::net::error::ClientError;
use crate::state::auth::AuthState;

pub const UNAUTHORIZED_HINT: &str = "(Check if you are logged in and the token is valid)";
pub const STATUS_LOGGED_IN: &str = "Status: Logged In (Token present)";
pub const STATUS_LOGGED_OUT: &str = "Status: Not Logged In";

/// Pretty-printed JSON.
#[must_use]
pub fn render_result(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// `Error: <message>`, then a `Details:` block when the response carried a
/// body, then a re-login hint for 401.
#[must_use]
pub fn render_error(error: &ClientError) -> String {
    let mut out = format!("Error: {error}");
    if let Some(request) = error.as_request() {
        if let Some(body) = request.body.as_ref().filter(|b| !b.is_empty()) {
            out.push_str("\n\nDetails: ");
            out.push_str(&body.to_pretty());
        }
        if request.is_unauthorized() {
            out.push('\n');
            out.push_str(UNAUTHORIZED_HINT);
        }
    }
    out
}

#[must_use]
pub fn render_status(auth: &AuthState) -> &'static str {
    if auth.is_authenticated() { STATUS_LOGGED_IN } else { STATUS_LOGGED_OUT }
}
