//! Command-line interface for the helper binary.
//!
//! `OpenVPN` invokes this exactly the way it invokes any
//! `auth-user-pass-verify` script: as `<program> <credentials-file>`, with
//! the rest of the request carried in the environment (see
//! [`crate::request::build_request`]).

use clap::Parser;

/// Top-level command-line interface definition.
#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    /// Path to the credentials file `OpenVPN` passes as this script's first
    /// argument. Line 1 is the username; line 2 (the password) is ignored.
    pub credentials_file: String,

    /// Path to the daemon's local socket.
    #[arg(long, env = "OIDC_AUTH_BRIDGE_SOCKET", default_value = "/var/run/oidc-auth-bridge/oidc-auth.sock")]
    pub socket: String,
}
