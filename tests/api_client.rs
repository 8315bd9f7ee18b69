//! End-to-end checks against an in-process stand-in for the course server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use course_client::forms::{self, UserForm};
use course_client::render::render_result;
use course_client::state::auth::TOKEN_KEY;
use course_client::{
    ApiClient, AuthState, ClientError, ErrorBody, FileStore, MemoryStore, RequestExecutor, StorageError,
    TokenStore,
};
use serde_json::{Value, json};

// =============================================================================
// TEST SERVER
// =============================================================================

#[derive(Debug, Clone)]
struct Seen {
    path: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: Option<Value>,
}

#[derive(Clone, Default)]
struct Recorder {
    requests: Arc<Mutex<Vec<Seen>>>,
}

impl Recorder {
    fn record(&self, path: String, headers: &HeaderMap, body: Option<Value>) {
        let header = |name| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
        self.requests.lock().unwrap().push(Seen {
            path,
            authorization: header(AUTHORIZATION),
            content_type: header(CONTENT_TYPE),
            body,
        });
    }

    fn all(&self) -> Vec<Seen> {
        self.requests.lock().unwrap().clone()
    }

    fn last(&self) -> Seen {
        self.all().pop().expect("no request recorded")
    }
}

async fn list_users(State(rec): State<Recorder>, headers: HeaderMap) -> Json<Value> {
    rec.record("/api/v1/users".to_owned(), &headers, None);
    Json(json!([{ "id": 1, "name": "Ann", "age": 30 }]))
}

async fn get_user(State(rec): State<Recorder>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    rec.record(format!("/api/v1/users/{id}"), &headers, None);
    match id.as_str() {
        "404" => (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response(),
        "500" => (StatusCode::INTERNAL_SERVER_ERROR, [(CONTENT_TYPE, "text/plain")], "internal error").into_response(),
        "401" => (StatusCode::UNAUTHORIZED, Json(json!({ "error": "token expired" }))).into_response(),
        "bad-json" => (StatusCode::BAD_REQUEST, [(CONTENT_TYPE, "application/json")], "{oops").into_response(),
        "not-json" => (StatusCode::OK, [(CONTENT_TYPE, "text/plain")], "hello").into_response(),
        _ => Json(json!({ "id": id, "name": "Ann", "age": 30 })).into_response(),
    }
}

async fn create_user(State(rec): State<Recorder>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    rec.record("/api/v1/users".to_owned(), &headers, Some(body.clone()));
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn replace_user(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    rec.record(format!("/api/v1/users/{id}"), &headers, Some(body.clone()));
    Json(json!({ "id": id, "user": body }))
}

async fn delete_user(State(rec): State<Recorder>, headers: HeaderMap, Path(id): Path<String>) -> StatusCode {
    rec.record(format!("/api/v1/users/{id}"), &headers, None);
    StatusCode::NO_CONTENT
}

async fn login(State(rec): State<Recorder>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    rec.record("/api/v1/auth/login".to_owned(), &headers, Some(body.clone()));
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    match (username, password) {
        ("alice", "secret") => Json(json!({ "token": "abc123" })).into_response(),
        ("notoken", _) => Json(json!({ "ok": true })).into_response(),
        ("plain", _) => (StatusCode::UNAUTHORIZED, [(CONTENT_TYPE, "text/plain")], "nope").into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Bad credentials" }))).into_response(),
    }
}

async fn spawn_server() -> (String, Recorder) {
    let rec = Recorder::default();
    let app = Router::new()
        .route("/api/v1/users", get(list_users).post(create_user))
        .route(
            "/api/v1/users/{id}",
            get(get_user).put(replace_user).patch(replace_user).delete(delete_user),
        )
        .route("/api/v1/auth/login", post(login))
        .with_state(rec.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), rec)
}

fn client_with_store(base_url: &str, store: Arc<dyn TokenStore>) -> ApiClient {
    let auth = AuthState::load(Box::new(store)).unwrap();
    ApiClient::new(RequestExecutor::new(base_url, Arc::new(auth)).unwrap())
}

fn client_with_token(base_url: &str, token: Option<&str>) -> (ApiClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    if let Some(token) = token {
        store.set(TOKEN_KEY, token).unwrap();
    }
    let client = client_with_store(base_url, store.clone());
    (client, store)
}

/// Holds a token but refuses every write.
#[derive(Debug, Default)]
struct ReadOnlyStore {
    removed: Mutex<bool>,
}

impl TokenStore for ReadOnlyStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(Some("stale".to_owned()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Poisoned)
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        *self.removed.lock().unwrap() = true;
        Ok(())
    }
}

fn request_error(err: &ClientError) -> &course_client::RequestError {
    err.as_request().unwrap_or_else(|| panic!("expected request error, got {err:?}"))
}

// =============================================================================
// AUTH HEADER
// =============================================================================

#[tokio::test]
async fn bearer_header_sent_when_token_held() {
    let (base, rec) = spawn_server().await;
    let (api, _) = client_with_token(&base, Some("abc123"));

    api.list_users().await.unwrap();

    assert_eq!(rec.last().authorization.as_deref(), Some("Bearer abc123"));
}

#[tokio::test]
async fn no_authorization_header_without_token() {
    let (base, rec) = spawn_server().await;
    let (api, _) = client_with_token(&base, None);

    let users = api.list_users().await.unwrap();

    assert_eq!(users, json!([{ "id": 1, "name": "Ann", "age": 30 }]));
    assert_eq!(rec.last().authorization, None);
}

#[tokio::test]
async fn rendered_result_keeps_server_key_order() {
    let (base, _) = spawn_server().await;
    let (api, _) = client_with_token(&base, None);

    let users = api.list_users().await.unwrap();

    assert_eq!(
        render_result(&users),
        "[\n  {\n    \"id\": 1,\n    \"name\": \"Ann\",\n    \"age\": 30\n  }\n]"
    );
}

// =============================================================================
// LOGIN
// =============================================================================

#[tokio::test]
async fn login_success_stores_token() {
    let (base, rec) = spawn_server().await;
    let (api, store) = client_with_token(&base, None);
    let request = forms::login_request(Some("alice"), Some("secret")).unwrap();

    let value = api.login(&request).await.unwrap();

    assert_eq!(value, json!({ "message": "Login Successful!", "receivedToken": "********" }));
    assert!(api.auth().is_authenticated());
    assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("abc123"));
    assert_eq!(rec.last().body, Some(json!({ "username": "alice", "password": "secret" })));
}

#[tokio::test]
async fn login_request_never_carries_old_token() {
    let (base, rec) = spawn_server().await;
    let (api, _) = client_with_token(&base, Some("stale"));
    let request = forms::login_request(Some("alice"), Some("secret")).unwrap();

    api.login(&request).await.unwrap();

    assert_eq!(rec.last().authorization, None);
    assert_eq!(api.auth().token().as_deref(), Some("abc123"));
}

#[tokio::test]
async fn login_rejected_clears_prior_token() {
    let (base, _) = spawn_server().await;
    let (api, store) = client_with_token(&base, Some("stale"));
    let request = forms::login_request(Some("alice"), Some("wrong")).unwrap();

    let err = api.login(&request).await.unwrap_err();

    let request_err = request_error(&err);
    assert_eq!(request_err.status, Some(401));
    assert_eq!(request_err.body, Some(ErrorBody::Json(json!({ "error": "Bad credentials" }))));
    assert!(!api.auth().is_authenticated());
    assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn login_without_token_field_fails_and_clears() {
    let (base, _) = spawn_server().await;
    let (api, store) = client_with_token(&base, Some("stale"));
    let request = forms::login_request(Some("notoken"), Some("pw")).unwrap();

    let err = api.login(&request).await.unwrap_err();

    assert!(matches!(err, ClientError::MissingToken));
    assert!(!api.auth().is_authenticated());
    assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn login_clears_token_when_store_rejects_write() {
    let (base, _) = spawn_server().await;
    let store = Arc::new(ReadOnlyStore::default());
    let api = client_with_store(&base, store.clone());
    assert!(api.auth().is_authenticated());
    let request = forms::login_request(Some("alice"), Some("secret")).unwrap();

    let err = api.login(&request).await.unwrap_err();

    assert!(matches!(err, ClientError::Storage(StorageError::Poisoned)));
    assert!(!api.auth().is_authenticated());
    assert!(*store.removed.lock().unwrap());
}

#[tokio::test]
async fn login_text_rejection_uses_fallback_body() {
    let (base, _) = spawn_server().await;
    let (api, _) = client_with_token(&base, None);
    let request = forms::login_request(Some("plain"), Some("pw")).unwrap();

    let err = api.login(&request).await.unwrap_err();

    assert_eq!(
        request_error(&err).body,
        Some(ErrorBody::Json(json!({ "error": "Login failed. Check credentials." })))
    );
}

#[tokio::test]
async fn file_backed_token_survives_restart() {
    let (base, _) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");

    let api = client_with_store(&base, Arc::new(FileStore::new(&path)));
    let request = forms::login_request(Some("alice"), Some("secret")).unwrap();
    api.login(&request).await.unwrap();

    let restarted = AuthState::load(Box::new(FileStore::new(&path))).unwrap();
    assert_eq!(restarted.token().as_deref(), Some("abc123"));
}

#[tokio::test]
async fn logout_clears_token_without_request() {
    let (base, rec) = spawn_server().await;
    let (api, store) = client_with_token(&base, Some("abc123"));

    api.logout().unwrap();

    assert!(!api.auth().is_authenticated());
    assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    assert!(rec.all().is_empty());
}

// =============================================================================
// RESPONSE CLASSIFICATION
// =============================================================================

#[tokio::test]
async fn not_found_json_body_is_parsed() {
    let (base, _) = spawn_server().await;
    let (api, _) = client_with_token(&base, None);

    let err = api.get_user("404").await.unwrap_err();

    let request_err = request_error(&err);
    assert_eq!(request_err.status, Some(404));
    assert_eq!(request_err.message, "HTTP error! Status: 404");
    assert_eq!(request_err.body, Some(ErrorBody::Json(json!({ "error": "not found" }))));
}

#[tokio::test]
async fn server_error_text_body_is_kept() {
    let (base, _) = spawn_server().await;
    let (api, _) = client_with_token(&base, None);

    let err = api.get_user("500").await.unwrap_err();

    let request_err = request_error(&err);
    assert_eq!(request_err.status, Some(500));
    assert_eq!(request_err.body, Some(ErrorBody::Text("internal error".to_owned())));
}

#[tokio::test]
async fn declared_json_that_is_not_json_falls_back_to_text() {
    let (base, _) = spawn_server().await;
    let (api, _) = client_with_token(&base, None);

    let err = api.get_user("bad-json").await.unwrap_err();

    assert_eq!(request_error(&err).body, Some(ErrorBody::Text("{oops".to_owned())));
}

#[tokio::test]
async fn unauthorized_response_keeps_token() {
    let (base, _) = spawn_server().await;
    let (api, store) = client_with_token(&base, Some("abc123"));

    let err = api.get_user("401").await.unwrap_err();

    assert!(request_error(&err).is_unauthorized());
    assert!(api.auth().is_authenticated());
    assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("abc123"));
}

#[tokio::test]
async fn success_body_that_is_not_json_is_fatal() {
    let (base, _) = spawn_server().await;
    let (api, _) = client_with_token(&base, None);

    let err = api.get_user("not-json").await.unwrap_err();

    assert!(matches!(err, ClientError::InvalidSuccessBody(_)));
}

#[tokio::test]
async fn delete_returns_synthetic_no_content_value() {
    let (base, rec) = spawn_server().await;
    let (api, _) = client_with_token(&base, Some("abc123"));

    let value = api.delete_user("7").await.unwrap();

    assert_eq!(value, json!({ "status": 204, "message": "Operation successful (No Content)" }));
    assert_eq!(rec.last().path, "/api/v1/users/7");
}

#[tokio::test]
async fn transport_failure_has_no_status() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let (api, _) = client_with_token(&format!("http://{addr}"), None);

    let err = api.list_users().await.unwrap_err();

    let request_err = request_error(&err);
    assert_eq!(request_err.status, None);
    assert_eq!(request_err.body, None);
    assert!(!request_err.message.is_empty());
}

// =============================================================================
// WRITES
// =============================================================================

#[tokio::test]
async fn create_sends_json_dto_with_token() {
    let (base, rec) = spawn_server().await;
    let (api, _) = client_with_token(&base, Some("abc123"));
    let form = UserForm {
        id: None,
        name: Some("Ann".to_owned()),
        age: Some("30".to_owned()),
        password: Some("pw".to_owned()),
    };

    let created = api.create_user(&form.create_dto().unwrap()).await.unwrap();

    assert_eq!(created, json!({ "name": "Ann", "age": 30, "password": "pw" }));
    let seen = rec.last();
    assert_eq!(seen.authorization.as_deref(), Some("Bearer abc123"));
    assert_eq!(seen.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn update_without_password_omits_field() {
    let (base, rec) = spawn_server().await;
    let (api, _) = client_with_token(&base, None);
    let form = UserForm {
        id: Some("3".to_owned()),
        name: Some("Ann".to_owned()),
        age: Some("31".to_owned()),
        password: None,
    };
    let (id, user) = form.update_request().unwrap();

    api.update_user(&id, &user).await.unwrap();

    let seen = rec.last();
    assert_eq!(seen.path, "/api/v1/users/3");
    assert_eq!(seen.body, Some(json!({ "name": "Ann", "age": 31 })));
}

#[tokio::test]
async fn patch_sends_partial_object() {
    let (base, rec) = spawn_server().await;
    let (api, _) = client_with_token(&base, None);
    let (id, fields) = forms::patch_request(Some("3"), Some(r#"{"age": 41}"#)).unwrap();

    let value = api.patch_user(&id, fields).await.unwrap();

    assert_eq!(value, json!({ "id": "3", "user": { "age": 41 } }));
    assert_eq!(rec.last().body, Some(json!({ "age": 41 })));
}

#[tokio::test]
async fn malformed_patch_never_reaches_server() {
    let (base, rec) = spawn_server().await;
    let (api, _) = client_with_token(&base, None);

    let outcome = match forms::patch_request(Some("3"), Some("{age: 41")) {
        Ok((id, fields)) => api.patch_user(&id, fields).await,
        Err(e) => Err(e),
    };

    assert!(matches!(outcome, Err(ClientError::MalformedPayload(_))));
    assert!(rec.all().is_empty());
}
