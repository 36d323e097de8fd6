//! HAR capture for intercepting HTTP proxies.
//!
//! Requests passing through the proxy are recorded as HAR 1.2 entries,
//! published to a message sink, and optionally archived per client mapping.

pub mod admin;
pub mod capture;
pub mod config;
pub mod har;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod sink;

pub use capture::{CaptureContext, Capturer};
pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
