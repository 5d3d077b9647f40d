//! Writes the three deferred-auth files the VPN server polls.
//!
//! All writes are synchronous `std::fs` calls at mode `0600`, matching the
//! the model that atomicity within a single `write` syscall is sufficient:
//! there is no partial-write recovery here because the VPN server never reads
//! a file until the byte that tells it to is present.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::os::unix::fs::OpenOptionsExt as _;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::WriterError;

/// Pending-file line limit: the `WEB_AUTH::<url>\n` line must be
/// at most this many bytes.
pub const MAX_WEB_AUTH_LINE_BYTES: usize = 256;

fn open_for_overwrite(path: &Path) -> Result<File, WriterError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|source| WriterError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Writes the three-line pending file the VPN server watches.
///
/// # Errors
///
/// Returns [`WriterError::InvalidArgument`] if `path`, `method` or `url` is
/// empty or `timeout_seconds` is not positive, [`WriterError::LineTooLong`] if
/// the third line would exceed [`MAX_WEB_AUTH_LINE_BYTES`], and
/// [`WriterError::Io`] if the file cannot be written.
pub fn write_pending(
    path: &Path,
    timeout_seconds: i64,
    method: &str,
    url: &str,
) -> Result<(), WriterError> {
    if path.as_os_str().is_empty() {
        return Err(WriterError::InvalidArgument("path must not be empty"));
    }
    if method.is_empty() {
        return Err(WriterError::InvalidArgument("method must not be empty"));
    }
    if url.is_empty() {
        return Err(WriterError::InvalidArgument("url must not be empty"));
    }
    if timeout_seconds <= 0 {
        return Err(WriterError::InvalidArgument(
            "timeout_seconds must be positive",
        ));
    }

    let web_auth_line = format!("WEB_AUTH::{url}\n");
    if web_auth_line.len() > MAX_WEB_AUTH_LINE_BYTES {
        return Err(WriterError::LineTooLong(web_auth_line.len()));
    }

    let contents = format!("{timeout_seconds}\n{method}\n{web_auth_line}");
    let mut file = open_for_overwrite(path)?;
    file.write_all(contents.as_bytes())
        .map_err(|source| WriterError::Io {
            path: path.display().to_string(),
            source,
        })?;
    debug!(path = %path.display(), timeout_seconds, method, "wrote pending file");
    Ok(())
}

/// Writes the single-byte accept verdict.
///
/// # Errors
///
/// Returns [`WriterError::Io`] if the file cannot be written.
pub fn write_success(control_path: &Path) -> Result<(), WriterError> {
    let mut file = open_for_overwrite(control_path)?;
    file.write_all(b"1").map_err(|source| WriterError::Io {
        path: control_path.display().to_string(),
        source,
    })?;
    debug!(path = %control_path.display(), "wrote success verdict");
    Ok(())
}

/// Writes the reject verdict, writing `reason` first.
///
/// The reason write is best-effort: a failure there is logged but does not
/// prevent the control-file write, since the VPN server only reads the
/// reason file after observing `0` in the control file, not before.
///
/// # Errors
///
/// Returns [`WriterError::Io`] if the control file itself cannot be written.
pub fn write_failure(
    control_path: &Path,
    reason_path: &Path,
    reason: &str,
) -> Result<(), WriterError> {
    match open_for_overwrite(reason_path).and_then(|mut f| {
        f.write_all(reason.as_bytes())
            .map_err(|source| WriterError::Io {
                path: reason_path.display().to_string(),
                source,
            })
    }) {
        Ok(()) => {}
        Err(err) => warn!(path = %reason_path.display(), %err, "failed to write reason file"),
    }

    let mut file = open_for_overwrite(control_path)?;
    file.write_all(b"0").map_err(|source| WriterError::Io {
        path: control_path.display().to_string(),
        source,
    })?;
    debug!(path = %control_path.display(), reason, "wrote failure verdict");
    Ok(())
}
