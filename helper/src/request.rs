//! Gathers the `OpenVPN` deferred-auth environment and credentials file into
//! the wire request the daemon expects.

use std::io::Read as _;
use std::path::Path;

use oidc_bridge_common::{AuthRequest, PendingAuthMethod, RequestKind};

use crate::error::HelperError;

fn require_env(name: &'static str) -> Result<String, HelperError> {
    std::env::var(name).map_err(|_| HelperError::MissingEnv(name))
}

fn optional_env(name: &'static str) -> String {
    std::env::var(name).unwrap_or_default()
}

/// Reads line 1 of the `OpenVPN`-supplied credentials file. Line 2 (the
/// password, which this bridge never uses — authentication happens in the
/// browser) is ignored.
fn read_username_from_credentials(path: &Path) -> Result<String, HelperError> {
    let mut contents = String::new();
    std::fs::File::open(path)
        .and_then(|mut f| f.read_to_string(&mut contents))
        .map_err(|source| HelperError::CredentialsFile {
            path: path.display().to_string(),
            source,
        })?;
    let username = contents.lines().next().unwrap_or_default().trim();
    if username.is_empty() {
        return Err(HelperError::EmptyCredentialsFile(path.display().to_string()));
    }
    Ok(username.to_owned())
}

/// Builds the `auth_request` the daemon expects from the process environment
/// `OpenVPN` sets for a deferred-auth script plus the credentials file path
/// it passes as the script's first argument.
///
/// The `username` environment variable, when set, takes precedence over the
/// credentials file's first line — it reflects whatever `OpenVPN` itself
/// already resolved (e.g. from a client certificate CN), which is more
/// trustworthy than a value the connecting client typed in.
///
/// # Errors
///
/// Returns [`HelperError::MissingEnv`] if a required environment variable is
/// absent, [`HelperError::UnsupportedClient`] if `IV_SSO` names no method
/// this bridge understands, and [`HelperError::CredentialsFile`] /
/// [`HelperError::EmptyCredentialsFile`] if the username must come from the
/// credentials file and that file cannot be read or is empty.
pub fn build_request(credentials_path: &Path) -> Result<AuthRequest, HelperError> {
    let auth_control_file = require_env("auth_control_file")?;
    let auth_pending_file = require_env("auth_pending_file")?;
    let auth_failed_reason_file = require_env("auth_failed_reason_file")?;

    let iv_sso = optional_env("IV_SSO");
    let capabilities: Vec<String> = iv_sso
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    let pending_auth_method =
        PendingAuthMethod::select(&capabilities).ok_or(HelperError::UnsupportedClient)?;

    let env_username = optional_env("username");
    let username = if env_username.trim().is_empty() {
        read_username_from_credentials(credentials_path)?
    } else {
        env_username
    };

    Ok(AuthRequest {
        kind: RequestKind::AuthRequest,
        username,
        common_name: optional_env("common_name"),
        untrusted_ip: optional_env("untrusted_ip"),
        untrusted_port: optional_env("untrusted_port"),
        auth_control_file,
        auth_pending_file,
        auth_failed_reason_file,
        pending_auth_method,
    })
}
