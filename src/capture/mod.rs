//! Capture orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! proxy request
//!     → context (correlation ID, exclusion flag)
//!     → middleware.rs (request hook)
//!     → capturer.rs (build entry, track in registry.rs)
//!     → body.rs (non-destructive body snapshot → PostData)
//!     → har codec → sink pipeline
//!     → request forwarded with its body intact
//!     → middleware.rs (response hook, currently a no-op)
//! ```

pub mod body;
pub mod capturer;
pub mod context;
pub mod middleware;
pub mod registry;
pub mod types;

pub use capturer::Capturer;
pub use context::{CaptureContext, CaptureContextExt};
pub use middleware::capture_middleware;
pub use registry::EntryRegistry;
pub use types::{CaptureError, CapturePolicy};
