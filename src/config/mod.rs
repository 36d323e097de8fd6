//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → sections handed to subsystems at construction
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The capture policy is the only setting changeable at runtime

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AccessLogConfig, AdminConfig, AppConfig, CaptureConfig, ListenerConfig, ObservabilityConfig, SinkConfig,
    SinkKind, TimeoutConfig, UpstreamConfig,
};
pub use validation::ValidationError;
