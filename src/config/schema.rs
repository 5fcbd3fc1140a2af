//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! large-response server and client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::protocol::{
    DEFAULT_SIZE_LIMIT_MB, LARGE_RESPONSE_MIME_TYPE, PAYLOAD_REF_PROPERTY, SIGNED_URL_EXPIRY_SECS,
    STORAGE_TIMEOUT_SECS,
};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LargeResponseConfig {
    /// Listener configuration for the server binary.
    pub listener: ListenerConfig,

    /// Response size guard settings.
    pub guard: GuardConfig,

    /// Where oversized payloads are written.
    pub offload: OffloadConfig,

    /// Client-side reference resolution defaults.
    pub resolver: ResolverConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Which hook the server installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GuardMode {
    /// Offload and rewrite oversized responses.
    #[default]
    Rewrite,
    /// Only log oversized responses.
    Observe,
}

/// Response size guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    pub mode: GuardMode,

    /// Fraction of `size_limit_in_mb` above which a WARN is logged.
    pub threshold_warn: f64,

    /// Fraction of `size_limit_in_mb` above which the response is rewritten.
    pub threshold_error: f64,

    /// Platform payload ceiling in MB.
    pub size_limit_in_mb: f64,

    /// Storage bucket receiving offloaded payloads.
    pub output_bucket: String,

    /// Literal message replacing the default 413 guidance.
    pub custom_error_message: Option<String>,

    /// Request header whose value groups offloaded objects (e.g. "x-org-id").
    /// Falls back to the authorizer identity, then to "all".
    pub group_by_header: Option<String>,

    /// Sentinel MIME type used as the capability signal.
    pub mime_type: String,

    /// Envelope key carrying the payload reference.
    pub ref_property: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            mode: GuardMode::default(),
            threshold_warn: 0.8,
            threshold_error: 0.95,
            size_limit_in_mb: DEFAULT_SIZE_LIMIT_MB,
            output_bucket: "large-responses".to_string(),
            custom_error_message: None,
            group_by_header: None,
            mime_type: LARGE_RESPONSE_MIME_TYPE.to_string(),
            ref_property: PAYLOAD_REF_PROPERTY.to_string(),
        }
    }
}

/// Offload backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OffloadBackend {
    /// In-process store served by the server under `/_payloads`.
    #[default]
    Memory,
    /// S3-compatible endpoint reached over HTTP.
    Http,
}

/// Offload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OffloadConfig {
    pub backend: OffloadBackend,

    /// Storage endpoint for the HTTP backend (e.g. "http://localhost:4566").
    pub endpoint: Option<String>,

    /// Base URL handed to clients. Defaults to `endpoint` for the HTTP
    /// backend and to the server's own `/_payloads` route for memory.
    pub public_base_url: Option<String>,

    /// Storage socket timeout in seconds.
    pub timeout_secs: u64,

    /// Lifetime of a handed-out reference in seconds.
    pub url_expiry_secs: u64,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            backend: OffloadBackend::default(),
            endpoint: None,
            public_base_url: None,
            timeout_secs: STORAGE_TIMEOUT_SECS,
            url_expiry_secs: SIGNED_URL_EXPIRY_SECS,
        }
    }
}

/// Client-side resolver defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Unset means "disabled" plus a one-time usage warning.
    pub enabled: Option<bool>,
    pub debug: Option<bool>,
    pub header_flag: String,
    pub ref_property: String,
    /// Timeout for the dereference fetch; none when unset.
    pub fetch_timeout_secs: Option<u64>,
    pub disable_warnings: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            debug: None,
            header_flag: LARGE_RESPONSE_MIME_TYPE.to_string(),
            ref_property: PAYLOAD_REF_PROPERTY.to_string(),
            fetch_timeout_secs: None,
            disable_warnings: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
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
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
