//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger → proxy listener, operator listener and archiver stop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: listeners drain first, the archiver drains its queue
//!   and saves the store last

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
