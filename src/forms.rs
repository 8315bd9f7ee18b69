//! Input validation for user-facing commands.
//!
//! Raw inputs arrive as optional strings, exactly as a form would hand them
//! over. Each builder either returns a typed payload or a
//! [`ClientError::Validation`] / [`ClientError::MalformedPayload`]; nothing
//! here touches the network.

#[cfg(test)]
#[path = "forms_test.rs"]
mod forms_test;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::net::error::ClientError;

pub const MISSING_CREDENTIALS: &str = "Please enter username and password.";
pub const MISSING_USER_ID: &str = "Please enter a User ID.";
pub const MISSING_CREATE_FIELDS: &str = "Please enter Name, Age, and Password for creating a user.";
pub const MISSING_UPDATE_FIELDS: &str = "Please enter User ID, Name, and Age for updating a user (PUT).";
pub const MISSING_PATCH_FIELDS: &str = "Please enter User ID and JSON Patch Data for patching a user.";
pub const INVALID_AGE: &str = "Age must be a whole number.";

/// Body of `POST /api/v1/users` and `PUT /api/v1/users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDto {
    pub name: String,
    pub age: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Body of `POST /api/v1/auth/login`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest").field("username", &self.username).finish_non_exhaustive()
    }
}

/// Raw user fields as typed by the operator.
#[derive(Debug, Clone, Default)]
pub struct UserForm {
    pub id: Option<String>,
    pub name: Option<String>,
    pub age: Option<String>,
    pub password: Option<String>,
}

impl UserForm {
    /// Validate for creation: name, age and password are all required.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the required fields, or
    /// [`INVALID_AGE`] when age is not an integer.
    pub fn create_dto(&self) -> Result<UserDto, ClientError> {
        let (Some(name), Some(age), Some(password)) =
            (trimmed(self.name.as_deref()), trimmed(self.age.as_deref()), secret(self.password.as_deref()))
        else {
            return Err(ClientError::Validation(MISSING_CREATE_FIELDS.to_owned()));
        };
        Ok(UserDto { name: name.to_owned(), age: parse_age(age)?, password: Some(password.to_owned()) })
    }

    /// Validate for a full update: id, name and age are required; an empty
    /// password means "keep the current one" and is left out of the body.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the required fields, or
    /// [`INVALID_AGE`] when age is not an integer.
    pub fn update_request(&self) -> Result<(String, UserDto), ClientError> {
        let (Some(id), Some(name), Some(age)) =
            (trimmed(self.id.as_deref()), trimmed(self.name.as_deref()), trimmed(self.age.as_deref()))
        else {
            return Err(ClientError::Validation(MISSING_UPDATE_FIELDS.to_owned()));
        };
        let dto = UserDto {
            name: name.to_owned(),
            age: parse_age(age)?,
            password: secret(self.password.as_deref()).map(str::to_owned),
        };
        Ok((id.to_owned(), dto))
    }
}

/// # Errors
///
/// Returns [`MISSING_CREDENTIALS`] when either field is empty.
pub fn login_request(username: Option<&str>, password: Option<&str>) -> Result<LoginRequest, ClientError> {
    match (trimmed(username), secret(password)) {
        (Some(username), Some(password)) => {
            Ok(LoginRequest { username: username.to_owned(), password: password.to_owned() })
        }
        _ => Err(ClientError::Validation(MISSING_CREDENTIALS.to_owned())),
    }
}

/// # Errors
///
/// Returns [`MISSING_USER_ID`] when the id is empty.
pub fn require_id(id: Option<&str>) -> Result<String, ClientError> {
    trimmed(id)
        .map(str::to_owned)
        .ok_or_else(|| ClientError::Validation(MISSING_USER_ID.to_owned()))
}

/// Parse patch text into a JSON object before anything is sent.
///
/// # Errors
///
/// Returns [`MISSING_PATCH_FIELDS`] when either input is empty and
/// [`ClientError::MalformedPayload`] when the text is not a JSON object.
pub fn patch_request(id: Option<&str>, data: Option<&str>) -> Result<(String, Map<String, Value>), ClientError> {
    let (Some(id), Some(data)) = (trimmed(id), trimmed(data)) else {
        return Err(ClientError::Validation(MISSING_PATCH_FIELDS.to_owned()));
    };
    let value: Value = serde_json::from_str(data).map_err(|e| ClientError::MalformedPayload(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(ClientError::MalformedPayload("patch data must be a JSON object".to_owned()));
    };
    Ok((id.to_owned(), fields))
}

fn trimmed(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

// Passwords are taken verbatim; only emptiness counts as missing.
fn secret(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.is_empty())
}

fn parse_age(raw: &str) -> Result<i32, ClientError> {
    raw.parse::<i32>().map_err(|_| ClientError::Validation(INVALID_AGE.to_owned()))
}
