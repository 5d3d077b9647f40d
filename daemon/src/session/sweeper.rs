//! Background task that writes timeout verdicts for sessions nobody ever
//! called back for.
//!
//! A `tokio::spawn`ed loop on a `tokio::time::interval`, started once at
//! startup and left running until the process shuts down.

use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::control_file;
use crate::session::SessionRegistry;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const TIMEOUT_REASON: &str = "authentication timed out";

/// Spawns the sweeper. The returned handle can be aborted at shutdown.
pub fn spawn_sweeper(registry: SessionRegistry) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        // First tick fires immediately; skip it so we don't sweep right after startup.
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep_once(&registry, SystemTime::now()).await;
        }
    })
}

async fn sweep_once(registry: &SessionRegistry, now: SystemTime) {
    let expired = registry.expired_ids(now).await;
    if expired.is_empty() {
        return;
    }
    debug!(count = expired.len(), "sweeping expired sessions");
    for session in expired {
        if registry.mark_result_written(&session.id).await {
            if let Err(err) = control_file::write_failure(
                &session.auth_control_file,
                &session.auth_failed_reason_file,
                TIMEOUT_REASON,
            ) {
                warn!(session_id = %session.id, %err, "failed to write timeout verdict");
            } else {
                info!(session_id = %session.id, "wrote timeout verdict for expired session");
            }
        }
        registry.delete(&session.id).await;
    }
}
