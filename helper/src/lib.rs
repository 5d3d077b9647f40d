//! `auth-user-pass-verify` helper script for the OIDC deferred-auth bridge.
//!
//! `OpenVPN` runs this binary once per connection attempt with the
//! deferred-auth environment set and a credentials file path as its sole
//! argument. It forwards a single request to the daemon over
//! [`transport::send_request`] and translates the reply into the exit code
//! `OpenVPN` expects from a deferred-auth script: `2` to defer (the daemon
//! has written the pending file; `OpenVPN` waits on it), anything else is a
//! rejection. The helper itself writes no control files — the daemon owns
//! that, since it alone knows the session's eventual verdict.

pub mod cli;
pub mod error;
pub mod request;
pub mod transport;

use std::path::Path;
use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub use cli::Cli;
use oidc_bridge_common::ResponseStatus;

/// Exit code `OpenVPN` treats as "deferred": the pending file names a method
/// and URL and it should wait for the control file to change.
const EXIT_DEFERRED: u8 = 2;
/// Exit code for any outcome other than a successful deferral.
const EXIT_FAILURE: u8 = 1;

/// The helper's main function; can be called from a shim binary.
///
/// Never returns an error: every failure mode maps to [`EXIT_FAILURE`] so
/// `OpenVPN` sees a plain rejection rather than a crash.
#[must_use]
pub fn inner_main(cli: Cli) -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .without_time()
        .init();

    match run(&cli) {
        Ok(true) => {
            info!("daemon deferred authentication, waiting on pending file");
            ExitCode::from(EXIT_DEFERRED)
        }
        Ok(false) => {
            warn!("daemon returned a non-deferred response");
            ExitCode::from(EXIT_FAILURE)
        }
        Err(err) => {
            error!(%err, "deferred-auth request failed");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Builds and sends the request, returning whether the daemon deferred it.
fn run(cli: &Cli) -> Result<bool, error::HelperError> {
    let request = request::build_request(Path::new(&cli.credentials_file))?;
    let response = transport::send_request(Path::new(&cli.socket), &request)?;
    match response.status {
        ResponseStatus::Deferred => Ok(true),
        ResponseStatus::Error => {
            if let Some(message) = &response.error {
                warn!(message, "daemon rejected auth request");
            }
            Ok(false)
        }
    }
}
