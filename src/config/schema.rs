//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gatekeeper.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gatekeeper service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Static credentials checked on every protected request.
    pub auth: AuthConfig,

    /// Abuse-mitigation tunables.
    pub security: SecurityConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operator endpoints.
    pub admin: AdminConfig,
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

/// Externally provisioned credentials.
///
/// Both values are required; the defaults are empty so validation fails
/// unless the file or the environment supplies them.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Static bearer token (`Authorization: Bearer <token>`).
    pub api_token: String,

    /// Shared HMAC-SHA256 secret for `X-Signature`.
    pub hmac_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_token", &"[REDACTED]")
            .field("hmac_secret", &"[REDACTED]")
            .finish()
    }
}

/// Failure tracking, blocking and slowdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Failures inside one window before the address is blocked.
    pub max_failures: u32,

    /// Sliding failure window in seconds.
    pub fail_window_secs: u64,

    /// How long a block lasts, in seconds.
    pub block_duration_secs: u64,

    /// Interval between cleanup sweeps, in seconds.
    pub cleanup_tick_secs: u64,

    /// Delay added per failure, in milliseconds.
    pub slowdown_step_ms: u64,

    /// Ceiling for the accumulated delay, in milliseconds.
    pub slowdown_max_ms: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Add hardening response headers.
    pub enable_headers: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            fail_window_secs: 60,
            block_duration_secs: 600,
            cleanup_tick_secs: 300,
            slowdown_step_ms: 200,
            slowdown_max_ms: 2000,
            max_body_size: 2 * 1024 * 1024, // 2MB
            enable_headers: true,
        }
    }
}

impl SecurityConfig {
    pub fn fail_window(&self) -> Duration {
        Duration::from_secs(self.fail_window_secs)
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_secs)
    }

    pub fn cleanup_tick(&self) -> Duration {
        Duration::from_secs(self.cleanup_tick_secs)
    }

    pub fn slowdown_step(&self) -> Duration {
        Duration::from_millis(self.slowdown_step_ms)
    }

    pub fn slowdown_max(&self) -> Duration {
        Duration::from_millis(self.slowdown_max_ms)
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount `/admin/*` routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
        }
    }
}
