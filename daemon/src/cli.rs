//! Command-line interface for the daemon binary.

use std::env;

use clap::Parser;

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    /// Path to the daemon's TOML configuration file.
    #[arg(
        short,
        long,
        env = "OIDC_AUTH_BRIDGE_CONFIG_PATH",
        default_value = "/etc/oidc-auth-bridge/oidc-auth-bridge.toml"
    )]
    pub config: String,

    /// Overrides `http.bind` from the config file.
    #[arg(long)]
    pub bind: Option<String>,

    /// Overrides `socket.path` from the config file.
    #[arg(long)]
    pub socket: Option<String>,
}
