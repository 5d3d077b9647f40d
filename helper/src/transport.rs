//! Blocking client for the daemon's local-socket protocol.
//!
//! The helper is a short-lived process invoked once per connection attempt,
//! so it has no need for an async runtime: a plain
//! [`std::os::unix::net::UnixStream`] with read/write timeouts matches the
//! daemon's length-framed wire format (4-byte big-endian length prefix, JSON
//! body) from `daemon::ipc`.

use std::io::{Read as _, Write as _};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use oidc_bridge_common::{AuthRequest, AuthResponse, MAX_FRAME_LEN};

use crate::error::HelperError;

/// Applied to both the read and write halves of the connection. The daemon
/// answers a well-formed request immediately; a timeout this generous only
/// ever fires if the daemon is wedged or the socket is stale.
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends `request` to the daemon over `socket_path` and returns its reply.
///
/// # Errors
///
/// Returns [`HelperError::Connect`] if the socket cannot be reached,
/// [`HelperError::Io`] on any read/write failure (including a timeout),
/// [`HelperError::FrameTooLarge`] if the daemon's reply exceeds
/// [`MAX_FRAME_LEN`], and [`HelperError::MalformedResponse`] if the reply
/// body isn't valid JSON for [`AuthResponse`].
pub fn send_request(socket_path: &Path, request: &AuthRequest) -> Result<AuthResponse, HelperError> {
    let mut stream = UnixStream::connect(socket_path).map_err(|source| HelperError::Connect {
        path: socket_path.display().to_string(),
        source,
    })?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;

    let body = serde_json::to_vec(request)?;
    write_frame(&mut stream, &body)?;
    let response_bytes = read_frame(&mut stream)?;
    let response: AuthResponse = serde_json::from_slice(&response_bytes)?;
    Ok(response)
}

fn write_frame(stream: &mut UnixStream, body: &[u8]) -> Result<(), HelperError> {
    let len: u32 = body
        .len()
        .try_into()
        .map_err(|_| HelperError::FrameTooLarge(body.len() as u32, MAX_FRAME_LEN))?;
    stream.write_all(&len.to_be_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

fn read_frame(stream: &mut UnixStream) -> Result<Vec<u8>, HelperError> {
    let mut len_buf = [0_u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(HelperError::FrameTooLarge(len, MAX_FRAME_LEN));
    }
    let mut buf = vec![0_u8; len as usize];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oidc_bridge_common::{PendingAuthMethod, RequestKind};
    use std::io::Read as _;
    use std::os::unix::net::UnixListener;

    fn sample_request() -> AuthRequest {
        AuthRequest {
            kind: RequestKind::AuthRequest,
            username: "alice".to_owned(),
            common_name: String::new(),
            untrusted_ip: "10.0.0.5".to_owned(),
            untrusted_port: "1194".to_owned(),
            auth_control_file: "/tmp/ac".to_owned(),
            auth_pending_file: "/tmp/ap".to_owned(),
            auth_failed_reason_file: "/tmp/ar".to_owned(),
            pending_auth_method: PendingAuthMethod::Webauth,
        }
    }

    #[test]
    fn round_trips_a_deferred_response() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut len_buf = [0_u8; 4];
            stream.read_exact(&mut len_buf).unwrap();
            let len = u32::from_be_bytes(len_buf) as usize;
            let mut body = vec![0_u8; len];
            stream.read_exact(&mut body).unwrap();
            let _: AuthRequest = serde_json::from_slice(&body).unwrap();

            let response = AuthResponse::deferred("sess1".to_owned(), "https://x/auth/abc".to_owned());
            let response_body = serde_json::to_vec(&response).unwrap();
            stream
                .write_all(&(response_body.len() as u32).to_be_bytes())
                .unwrap();
            stream.write_all(&response_body).unwrap();
        });

        let response = send_request(&socket_path, &sample_request()).unwrap();
        assert!(response.is_deferred());
        assert_eq!(response.session_id.as_deref(), Some("sess1"));
        server.join().unwrap();
    }

    #[test]
    fn connect_failure_is_reported() {
        let err = send_request(Path::new("/nonexistent/socket"), &sample_request()).unwrap_err();
        assert!(matches!(err, HelperError::Connect { .. }));
    }
}
