use super::*;
use crate::net::error::{ErrorBody, RequestError};
use crate::state::storage::MemoryStore;

#[test]
fn result_is_pretty_printed() {
    let value = serde_json::json!({ "name": "Ann", "age": 30 });
    assert_eq!(render_result(&value), "{\n  \"name\": \"Ann\",\n  \"age\": 30\n}");
}

#[test]
fn error_with_json_details() {
    let err: ClientError =
        RequestError::http(404, Some(ErrorBody::Json(serde_json::json!({ "error": "not found" })))).into();
    assert_eq!(
        render_error(&err),
        "Error: HTTP error! Status: 404\n\nDetails: {\n  \"error\": \"not found\"\n}"
    );
}

#[test]
fn error_with_text_details() {
    let err: ClientError = RequestError::http(500, Some(ErrorBody::Text("internal error".to_owned()))).into();
    assert_eq!(render_error(&err), "Error: HTTP error! Status: 500\n\nDetails: internal error");
}

#[test]
fn empty_body_has_no_details() {
    let err: ClientError = RequestError::http(500, Some(ErrorBody::Text(String::new()))).into();
    assert_eq!(render_error(&err), "Error: HTTP error! Status: 500");
}

#[test]
fn unauthorized_appends_hint() {
    let err: ClientError =
        RequestError::http(401, Some(ErrorBody::Json(serde_json::json!({ "error": "expired" })))).into();
    let rendered = render_error(&err);
    assert!(rendered.starts_with("Error: HTTP error! Status: 401\n\nDetails: "));
    assert!(rendered.ends_with("\n(Check if you are logged in and the token is valid)"));
}

#[test]
fn transport_error_renders_message_only() {
    let err: ClientError = RequestError::transport("error sending request").into();
    assert_eq!(render_error(&err), "Error: error sending request");
}

#[test]
fn validation_error_gets_prefix() {
    let err = ClientError::Validation("Please enter a User ID.".to_owned());
    assert_eq!(render_error(&err), "Error: Please enter a User ID.");
}

#[test]
fn status_lines() {
    let auth = AuthState::load(Box::new(MemoryStore::new())).unwrap();
    assert_eq!(render_status(&auth), "Status: Not Logged In");
    auth.set("abc123").unwrap();
    assert_eq!(render_status(&auth), "Status: Logged In (Token present)");
}
