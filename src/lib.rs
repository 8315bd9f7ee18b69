//! Client for the course-server user-management REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! The `course-client` binary maps each subcommand onto one API call. This
//! crate owns the pieces that do the work: the persisted bearer-token slot
//! (`state`), the authenticated request executor and endpoint helpers
//! (`net`), input validation (`forms`) and terminal rendering (`render`).

pub mod config;
pub mod forms;
pub mod net;
pub mod render;
pub mod state;

pub use net::api::ApiClient;
pub use net::error::{ClientError, ErrorBody, RequestError};
pub use net::executor::{RequestExecutor, RequestOptions};
pub use state::auth::AuthState;
pub use state::storage::{FileStore, MemoryStore, StorageError, TokenStore};
