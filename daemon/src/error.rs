//! Typed error kinds for the core subsystem.
//!
//! Each enum corresponds to one row of the error taxonomy: callers that need
//! to branch on the specific failure (e.g. the callback handler choosing an
//! error page) match on these directly; code that just needs to propagate
//! composes them into `eyre::Result` with `?` the way the rest of the crate
//! does.

use thiserror::Error;

/// Errors from the control-file writer.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("pending line exceeds 256 bytes ({0} bytes)")]
    LineTooLong(usize),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the OIDC engine.
#[derive(Debug, Error)]
pub enum OidcError {
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("token response did not include an id_token")]
    NoIdToken,
    #[error("id_token verification failed: {0}")]
    TokenVerification(String),
    #[error("claim '{claim}' is missing from the token")]
    UsernameMissing { claim: String },
    #[error("username mismatch: token claim '{claim}' is '{actual}', expected '{expected}'")]
    UsernameMismatch {
        claim: String,
        actual: String,
        expected: String,
    },
    #[error("does not have required roles: have {have:?}, need one of {need:?}")]
    RoleDenied {
        have: Vec<String>,
        need: Vec<String>,
    },
    #[error("provider returned an error: {error}: {description}")]
    ProviderError { error: String, description: String },
}

/// Errors from loading and parsing the daemon's TOML configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: Box<toml::de::Error>,
    },
}

/// Errors from the session registry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("session expired")]
    Expired,
}

/// Errors surfaced to the helper over the local socket.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid request: {0}")]
    InvalidInput(&'static str),
    #[error("client did not advertise a supported auth method")]
    UnsupportedClient,
    #[error("short URL would exceed the 256-byte pending-file line limit")]
    UrlTooLong,
    #[error(transparent)]
    Writer(#[from] WriterError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Oidc(#[from] OidcError),
    #[error("malformed redirect_uri: {0}")]
    InvalidRedirectUri(String),
}
