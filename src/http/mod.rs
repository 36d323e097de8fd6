//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → request.rs (correlation ID, exclusion flag, client address)
//!     → capture middleware (entry built and published)
//!     → server.rs proxy handler (forward to origin / upstream)
//!     → response relayed to client
//! ```

pub mod request;
pub mod server;

pub use request::{assign_context, ContextPolicy, X_CAPTURE_SKIP, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
