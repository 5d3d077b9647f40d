//! Shapes of the daemon's TOML configuration file.

use std::path::PathBuf;

use serde::Deserialize;

use crate::oidc::OidcSettings;

/// Root config structure, loaded once at startup and optionally hot-reloaded
/// for the subset of fields that are safe to change while the daemon runs.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub oidc: OidcSettings,
    #[serde(default)]
    pub socket: SocketConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// How long a session may sit without a callback before the sweeper
    /// writes a timeout verdict for it.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
}

fn default_session_timeout_secs() -> u64 {
    300
}

/// Local-socket server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    #[serde(default = "default_socket_path")]
    pub path: PathBuf,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: default_socket_path(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/var/run/oidc-auth-bridge/oidc-auth.sock")
}

/// Callback HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            tls: None,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:9000".to_owned()
}

/// PEM certificate/key pair for the callback server's optional TLS listener.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}
