//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! capture / publish pipeline / archiver produce:
//!     → logging.rs (CaptureEvent → structured tracing events)
//! proxy middleware produces:
//!     → access_log.rs (one line per request and per response)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON or pretty)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Correlation ID flows through every capture event
//! - Event sink is injected, so tests can assert on events directly

pub mod access_log;
pub mod logging;
pub mod metrics;

pub use access_log::{access_log, RequestLogLine, ResponseLogLine};
pub use logging::{CaptureEvent, CaptureEvents, LogContext, MemoryEvents, TracingEvents};
