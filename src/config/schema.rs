//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! gateway daemon. All types derive Serde traits for deserialization
//! from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (socket path, limits, banner).
    pub listener: ListenerConfig,

    /// Reference authenticator configuration.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Absolute filesystem path the socket is bound at.
    pub socket_path: PathBuf,

    /// Banner sent in the Server header of every response.
    pub server_string: String,

    /// Optional chmod-style mode applied to the bound socket,
    /// e.g. `0o660`.
    pub socket_mode: Option<u32>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Transport read/write timeout in seconds.
    pub io_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/vaultgate/gateway.sock"),
            server_string: "VaultGate/0.1".to_string(),
            socket_mode: None,
            max_connections: 512,
            io_timeout_secs: 30,
        }
    }
}

/// Which reference authenticators the daemon wires up.
///
/// Leaving every section unset means no authenticator is registered and
/// the gateway rejects every request.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Peer-credential allow-list authenticator.
    pub creds: Option<CredsAuthConfig>,

    /// Trusted-header authenticator.
    pub header: Option<HeaderAuthConfig>,
}

/// Peer-credential allow-list settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CredsAuthConfig {
    /// User ids accepted as authenticated.
    pub allowed_uids: Vec<u32>,

    /// Group ids accepted as authenticated.
    pub allowed_gids: Vec<u32>,
}

/// Trusted-header authenticator settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderAuthConfig {
    /// Header carrying the caller identity.
    pub name: String,

    /// Required header value; any value is accepted when unset.
    pub value: Option<String>,
}

impl Default for HeaderAuthConfig {
    fn default() -> Self {
        Self {
            name: "X-Gateway-User".to_string(),
            value: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
