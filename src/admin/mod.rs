//! Operator endpoints and capture archiving.
//!
//! # Endpoints
//! - `POST|DELETE /mappings`: register or remove a client address mapping
//! - `GET /mappings/requests?id=`: archived requests of one mapping
//! - `GET /entries`: HAR export of the in-memory entry table
//! - `POST /entries/reset`: clear the entry table
//! - `GET|PUT /capture/policy`: inspect or swap the capture policy

pub mod archive;
pub mod auth;
pub mod handlers;
pub mod store;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{any, get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::capture::Capturer;

pub use archive::{ArchiveOutcome, Archiver};
pub use store::{CaptureStore, Mapping, MappingKey, RequestRecord, StoreError};

/// Shared state of the operator endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub capturer: Arc<Capturer>,
    pub store: Arc<CaptureStore>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(capturer: Arc<Capturer>, store: Arc<CaptureStore>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            capturer,
            store,
            api_key: api_key.into(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/mappings", any(mappings))
        .route("/mappings/requests", any(mapping_requests))
        .route("/entries", get(export_entries))
        .route("/entries/reset", post(reset_entries))
        .route("/capture/policy", get(get_policy).put(put_policy))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
