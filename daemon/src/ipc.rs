//! Local-socket server the helper connects to once per VPN connection attempt.
//!
//! Accept loop and stale-socket cleanup are grounded on the accept-loop shape
//! in the pack's IPC reference (`other_examples` darklock-guard `ipc.rs`):
//! bind, remove any stale socket file first, spawn one task per accepted
//! connection. The wire format differs: a 4-byte big-endian length prefix
//! followed by a JSON body, one request/response pair per connection, then
//! close — no handshake, no session/nonce tracking, since the socket's mode
//! bits are the only authentication this protocol needs.

use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use oidc_bridge_common::{AuthResponse, MAX_FRAME_LEN};

use crate::orchestrator::Orchestrator;

const SOCKET_MODE: u32 = 0o660;
const DIR_MODE: u32 = 0o755;

/// Binds the socket, serving connections until [`shutdown`] is signalled.
///
/// # Errors
///
/// Returns an error if the containing directory cannot be created, the
/// socket cannot be bound, or its permissions cannot be set.
pub async fn serve(
    socket_path: PathBuf,
    orchestrator: Orchestrator,
    shutdown: Arc<Notify>,
) -> eyre::Result<()> {
    use eyre::WrapErr as _;

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("creating socket directory {}", parent.display()))?;
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(DIR_MODE))
            .wrap_err_with(|| format!("setting permissions on {}", parent.display()))?;
    }
    remove_stale_socket(&socket_path)?;

    let listener = UnixListener::bind(&socket_path)
        .wrap_err_with(|| format!("binding local socket at {}", socket_path.display()))?;
    std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))
        .wrap_err_with(|| format!("setting permissions on {}", socket_path.display()))?;

    debug!(path = %socket_path.display(), "local-socket server listening");

    let mut handlers = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _addr) = accepted.wrap_err("accepting local-socket connection")?;
                let orchestrator = orchestrator.clone();
                handlers.spawn(async move {
                    if let Err(err) = handle_connection(stream, &orchestrator).await {
                        warn!(%err, "local-socket connection failed");
                    }
                });
            }
            () = shutdown.notified() => break,
        }
    }

    debug!("local-socket server shutting down, waiting for in-flight handlers");
    while handlers.join_next().await.is_some() {}
    std::fs::remove_file(&socket_path).ok();
    Ok(())
}

fn remove_stale_socket(path: &Path) -> eyre::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).map_err(eyre::Report::from),
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    orchestrator: &Orchestrator,
) -> eyre::Result<()> {
    let request_bytes = match read_frame(&mut stream).await? {
        Some(bytes) => bytes,
        None => return Ok(()),
    };

    let response = match serde_json::from_slice(&request_bytes) {
        Ok(req) => orchestrator.handle_auth_request(req).await,
        Err(err) => {
            debug!(%err, "malformed auth request");
            AuthResponse::error(format!("malformed request: {err}"))
        }
    };

    let response_bytes = serde_json::to_vec(&response)?;
    write_frame(&mut stream, &response_bytes).await
}

async fn read_frame(stream: &mut UnixStream) -> eyre::Result<Option<Vec<u8>>> {
    let len = match stream.read_u32().await {
        Ok(len) => len,
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if len > MAX_FRAME_LEN {
        error!(len, max = MAX_FRAME_LEN, "rejecting oversized IPC frame");
        return Err(eyre::eyre!("frame of {len} bytes exceeds {MAX_FRAME_LEN}"));
    }
    let mut buf = vec![0_u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

async fn write_frame(stream: &mut UnixStream, body: &[u8]) -> eyre::Result<()> {
    let len: u32 = body
        .len()
        .try_into()
        .map_err(|_| eyre::eyre!("response body too large to frame"))?;
    stream.write_u32(len).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}
