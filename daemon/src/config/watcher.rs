//! Watches the config file for edits and republishes the parts that are
//! safe to change while the daemon is running.
//!
//! Mirrors the teacher's `config::watcher`: a `notify` watcher feeding an
//! unbounded channel, forwarded into a `tokio::sync::watch` so readers can
//! pick up the latest config without polling. Bind address and socket path
//! are fixed at startup — changing either while running is unsupported and
//! is logged rather than applied, the same posture the teacher takes for its
//! own port/bind fields.

use std::path::PathBuf;
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::{mpsc::unbounded_channel, watch};
use tracing::{error, info};

use super::{loader::load_config, DaemonConfig};

/// Watches `path` for modifications and publishes reloaded configs onto
/// `tx`, applying only the fields safe to change live (OIDC role/claim
/// requirements, scopes, `allow_username_mismatch`). Runs until the watcher's
/// channel closes, which only happens if the underlying `notify` watcher is
/// dropped.
pub async fn watch_config_file(path: PathBuf, tx: watch::Sender<Arc<DaemonConfig>>) {
    let (raw_tx, mut raw_rx) = unbounded_channel::<Event>();
    let initial = tx.borrow().clone();
    let fixed_socket_path = initial.socket.path.clone();
    let fixed_bind = initial.http.bind.clone();

    let mut watcher = match RecommendedWatcher::new(
        move |res| {
            if let Ok(event) = res {
                let _ = raw_tx.send(event);
            }
        },
        notify::Config::default(),
    ) {
        Ok(watcher) => watcher,
        Err(err) => {
            error!(%err, "failed to create config file watcher, live-reload disabled");
            return;
        }
    };

    if let Err(err) = watcher.watch(&path, RecursiveMode::NonRecursive) {
        error!(%err, path = %path.display(), "failed to watch config file, live-reload disabled");
        return;
    }

    while let Some(event) = raw_rx.recv().await {
        if !matches!(event.kind, EventKind::Modify(_)) {
            continue;
        }
        info!(path = %path.display(), "config file modified, reloading");
        match load_config(&path).await {
            Ok(mut reloaded) => {
                if reloaded.socket.path != fixed_socket_path {
                    error!(
                        "socket path change detected in config file; changing it while the \
                         daemon is running is not supported, continuing to use {}",
                        fixed_socket_path.display()
                    );
                    reloaded.socket.path = fixed_socket_path.clone();
                }
                if reloaded.http.bind != fixed_bind {
                    error!(
                        "HTTP bind address change detected in config file; changing it while \
                         the daemon is running is not supported, continuing to use {fixed_bind}"
                    );
                    reloaded.http.bind = fixed_bind.clone();
                }
                let _ = tx.send(Arc::new(reloaded));
                info!("config reloaded");
            }
            Err(err) => error!(%err, "failed to reload config, keeping previous version"),
        }
    }
}
