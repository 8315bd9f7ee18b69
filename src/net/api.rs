//! Endpoint helpers for the user-management API.
//!
//! SYSTEM CONTEXT
//! ==============
//! One method per command. All of them go through [`RequestExecutor`], so
//! the bearer token, status branching and body classification are applied
//! uniformly. Login is the only call made without the token attached.
//!
//! ERROR HANDLING
//! ==============
//! Any login failure clears the stored token before the error is returned.
//! A 401 from any other endpoint leaves the token alone; the renderer only
//! advises logging in again.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use serde_json::{Map, Value};

use super::error::{ClientError, ErrorBody, RequestError};
use super::executor::{RequestExecutor, RequestOptions};
use crate::forms::{LoginRequest, UserDto};
use crate::state::auth::AuthState;

pub const USERS_PATH: &str = "/api/v1/users";
pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const LOGIN_FAILED_FALLBACK: &str = "Login failed. Check credentials.";

pub(crate) fn user_endpoint(id: &str) -> String {
    format!("{USERS_PATH}/{id}")
}

pub struct ApiClient {
    executor: RequestExecutor,
}

impl ApiClient {
    #[must_use]
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    #[must_use]
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    #[must_use]
    pub fn auth(&self) -> &AuthState {
        self.executor.auth()
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// `POST /api/v1/auth/login`: store the returned token.
    ///
    /// On success returns a display value that masks the token.
    ///
    /// # Errors
    ///
    /// Returns the request error, [`ClientError::MissingToken`] when the
    /// response has no usable token, or a storage error. The stored token is
    /// cleared in every failure case.
    pub async fn login(&self, request: &LoginRequest) -> Result<Value, ClientError> {
        let body = serde_json::to_value(request).map_err(|e| ClientError::MalformedPayload(e.to_string()))?;
        let options = RequestOptions::post().json(body).unauthenticated();

        let outcome = self
            .executor
            .execute(LOGIN_PATH, options)
            .await
            .map_err(with_login_fallback_body)
            .and_then(|value| {
                let token = extract_token(&value)?;
                self.auth().set(&token)?;
                Ok(())
            });

        match outcome {
            Ok(()) => {
                tracing::info!(username = %request.username, "login succeeded");
                Ok(login_success_value())
            }
            Err(error) => {
                if let Err(e) = self.auth().clear() {
                    tracing::warn!(error = %e, "failed to clear stored token after login failure");
                }
                tracing::info!(username = %request.username, error = %error, "login failed");
                Err(error)
            }
        }
    }

    /// Drop the held token. No request is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be updated.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.auth().clear()?;
        tracing::info!("logged out");
        Ok(())
    }

    // =========================================================================
    // USERS
    // =========================================================================

    /// `GET /api/v1/users`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_users(&self) -> Result<Value, ClientError> {
        tracing::info!("Fetching all users...");
        self.executor.execute(USERS_PATH, RequestOptions::get()).await
    }

    /// `GET /api/v1/users/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_user(&self, id: &str) -> Result<Value, ClientError> {
        tracing::info!(%id, "Fetching user...");
        self.executor.execute(&user_endpoint(id), RequestOptions::get()).await
    }

    /// `POST /api/v1/users`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_user(&self, user: &UserDto) -> Result<Value, ClientError> {
        tracing::info!(name = %user.name, "Creating user...");
        let options = RequestOptions::post().json(user_body(user)?);
        self.executor.execute(USERS_PATH, options).await
    }

    /// `PUT /api/v1/users/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_user(&self, id: &str, user: &UserDto) -> Result<Value, ClientError> {
        tracing::info!(%id, "Updating user...");
        let options = RequestOptions::put().json(user_body(user)?);
        self.executor.execute(&user_endpoint(id), options).await
    }

    /// `PATCH /api/v1/users/{id}` with an arbitrary partial object.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn patch_user(&self, id: &str, fields: Map<String, Value>) -> Result<Value, ClientError> {
        tracing::info!(%id, "Patching user...");
        let options = RequestOptions::patch().json(Value::Object(fields));
        self.executor.execute(&user_endpoint(id), options).await
    }

    /// `DELETE /api/v1/users/{id}`; the server answers 204.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_user(&self, id: &str) -> Result<Value, ClientError> {
        tracing::info!(%id, "Deleting user...");
        self.executor.execute(&user_endpoint(id), RequestOptions::delete()).await
    }
}

fn user_body(user: &UserDto) -> Result<Value, ClientError> {
    serde_json::to_value(user).map_err(|e| ClientError::MalformedPayload(e.to_string()))
}

pub(crate) fn login_success_value() -> Value {
    serde_json::json!({ "message": "Login Successful!", "receivedToken": "********" })
}

pub(crate) fn extract_token(value: &Value) -> Result<String, ClientError> {
    value
        .get("token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or(ClientError::MissingToken)
}

/// Failed logins whose body is not JSON report a generic credential error.
pub(crate) fn with_login_fallback_body(error: ClientError) -> ClientError {
    let (status, message, body) = match error {
        ClientError::Request(RequestError { status: Some(status), message, body }) => (status, message, body),
        other => return other,
    };
    let body = match body {
        Some(ErrorBody::Json(value)) => ErrorBody::Json(value),
        Some(ErrorBody::Text(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(value) => ErrorBody::Json(value),
            Err(_) => login_fallback_body(),
        },
        None => login_fallback_body(),
    };
    ClientError::Request(RequestError { status: Some(status), message, body: Some(body) })
}

fn login_fallback_body() -> ErrorBody {
    ErrorBody::Json(serde_json::json!({ "error": LOGIN_FAILED_FALLBACK }))
}
