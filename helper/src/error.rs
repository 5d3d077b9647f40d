//! Error kinds for the helper binary. Every variant maps to exit code 1;
//! the binary never distinguishes failure reasons beyond logging them,
//! since `OpenVPN` only observes the process's exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelperError {
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("client did not advertise a supported auth method via IV_SSO")]
    UnsupportedClient,
    #[error("failed to read credentials file {path}: {source}")]
    CredentialsFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("credentials file {0} is empty")]
    EmptyCredentialsFile(String),
    #[error("failed to connect to daemon socket {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error talking to daemon: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed response from daemon: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("daemon rejected the request: {0}")]
    DaemonError(String),
    #[error("response frame of {0} bytes exceeds the {1}-byte limit")]
    FrameTooLarge(u32, u32),
}
