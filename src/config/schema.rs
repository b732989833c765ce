//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the tenant router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend the versioned requests are forwarded to.
    pub backend: BackendConfig,

    /// External version-lookup service.
    pub version_lookup: VersionLookupConfig,

    /// On-disk deployment layout scanned for resolved paths.
    pub deployments: DeploymentConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

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

/// Backend target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend authority (`host[:port]`), no scheme.
    pub host: String,

    /// Path prefix the router itself is mounted under. Stripped from the
    /// inbound path before forwarding.
    pub path_base: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "bms-internal-web-service-01.ayudasky.com.local".to_string(),
            path_base: "/BMSInternalWebService".to_string(),
        }
    }
}

/// Version-lookup service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VersionLookupConfig {
    /// Base URL; requests go to `<api_url>/get_version/<tenant host>/`.
    pub api_url: String,

    /// Static token sent in the `Authorization` header.
    pub token: String,

    /// Authorization scheme preceding the token.
    pub auth_scheme: String,

    /// Lookup request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for VersionLookupConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            token: String::new(),
            auth_scheme: "Token".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Deployment filesystem layout.
///
/// ```text
/// <root>/<environment>/<service_dir>/<version>
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Directory holding one subdirectory per environment.
    pub root: PathBuf,

    /// Service subdirectory inside every environment.
    pub service_dir: String,

    /// Environment names, highest priority first.
    pub environments: Vec<String>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(r"C:\Broadsign\AyudaApps"),
            service_dir: "BmsInternalWebService".to_string(),
            environments: vec![
                "Cloud NA".to_string(),
                "Preview CA".to_string(),
                "Labs NA".to_string(),
            ],
        }
    }
}

/// Timeout configuration for backend traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the backend to send response headers, in seconds.
    pub backend_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub pool_idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            backend_secs: 100,
            pool_idle_secs: 90,
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

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
