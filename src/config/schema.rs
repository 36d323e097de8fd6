//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure of the capturing
//! proxy. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::capture::CapturePolicy;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Proxy listener.
    pub listener: ListenerConfig,

    /// Where origin-form requests are forwarded.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// What is captured.
    pub capture: CaptureConfig,

    /// Where captured entries are published.
    pub sink: SinkConfig,

    /// Operator endpoints.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream used for requests that arrive in origin form.
///
/// Absolute-form requests (forward-proxy style) go to the authority in their
/// URI regardless of this setting.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream authority (e.g., "127.0.0.1:3000").
    pub address: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Capture policy and limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Record response bodies (default: true).
    pub body_logging: bool,

    /// Record request post data (default: true). When false only the MIME
    /// type of a body is kept.
    pub post_data_logging: bool,

    /// Largest request body snapshot in bytes.
    pub max_body_bytes: usize,

    /// Requests whose path starts with one of these are not captured.
    pub skip_path_prefixes: Vec<String>,
}

impl CaptureConfig {
    pub fn policy(&self) -> CapturePolicy {
        CapturePolicy {
            body_logging: self.body_logging,
            post_data_logging: self.post_data_logging,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            body_logging: true,
            post_data_logging: true,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            skip_path_prefixes: vec!["/healthz".to_string()],
        }
    }
}

/// Which publisher receives entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Log every entry, keep nothing.
    Print,
    /// In-process queue consumed by the archiver.
    Channel,
}

/// Publish settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,

    /// Exchange name; empty means the default exchange.
    pub exchange: String,

    /// Routing key, i.e. the destination queue name.
    pub routing_key: String,

    pub mandatory: bool,

    pub immediate: bool,

    /// Capacity of the in-process queue.
    pub queue_capacity: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Channel,
            exchange: String::new(),
            routing_key: "har".to_string(),
            mandatory: false,
            immediate: false,
            queue_capacity: 1024,
        }
    }
}

/// Operator endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the operator endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token). Empty disables auth.
    pub api_key: String,

    /// Operator endpoint bind address.
    pub bind_address: String,

    /// JSON file mappings and archived requests are persisted to.
    pub persistence_path: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
            persistence_path: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Per-exchange access log lines.
    pub access_log: AccessLogConfig,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            access_log: AccessLogConfig::default(),
        }
    }
}

/// Which halves of each proxied exchange get an access log line.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessLogConfig {
    /// Log a line when a request arrives.
    pub requests: bool,

    /// Log a line when the response goes back.
    pub responses: bool,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            requests: true,
            responses: true,
        }
    }
}
