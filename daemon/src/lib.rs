//! Fake library entry for the `oidc_bridge_daemon` crate.
//!
//! Exposes `inner_main` so the workspace-level shim binary (and integration
//! tests) can call into the daemon without going through a subprocess. Wires
//! together the four concerns spec'd out for the core subsystem — the
//! control-file writer, the OIDC engine, the session registry, and the two
//! ingress paths (`ipc`, `http`) — through the [`orchestrator::Orchestrator`].

pub mod cli;
pub mod config;
pub mod control_file;
pub mod error;
pub mod http;
pub mod ipc;
pub mod oidc;
pub mod orchestrator;
pub mod session;
pub mod util;

use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;

use eyre::{Result, WrapErr as _};
use tokio::sync::{watch, Notify};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::{load_config, watch_config_file, DaemonConfig};
use http::TlsSettings;
use oidc::{OidcEngine, OidcPolicy};
use orchestrator::Orchestrator;
use session::{spawn_sweeper, SessionRegistry};

static INIT_TRACING: Once = Once::new();
static INIT_RUSTLS: Once = Once::new();

/// Discovery is bounded by a fixed timeout so a slow/unreachable issuer
/// fails the daemon's startup quickly instead of hanging it.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// The daemon's main function; can be called from a shim binary.
///
/// Loads config, runs OIDC discovery, then serves the local-socket and
/// callback HTTP servers (plus the expiry sweeper and config watcher) until a
/// shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or parsed, the
/// `http.bind` address doesn't parse, OIDC discovery fails or times out, or
/// either server fails to start.
pub async fn inner_main(cli: Cli) -> Result<()> {
    INIT_TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    });

    let config_path = std::fs::canonicalize(&cli.config)
        .wrap_err_with(|| format!("config file not found at {}", cli.config))?;
    let mut config = load_config(&config_path).await.wrap_err("loading config")?;
    if let Some(bind) = &cli.bind {
        config.http.bind = bind.clone();
    }
    if let Some(socket) = &cli.socket {
        config.socket.path = socket.into();
    }
    info!(path = %config_path.display(), "loaded configuration");

    serve(config, config_path).await
}

/// Runs the daemon against an already-loaded config. Split out from
/// [`inner_main`] so integration tests can construct a [`DaemonConfig`]
/// directly instead of writing one to a temp file.
///
/// # Errors
///
/// See [`inner_main`].
pub async fn serve(config: DaemonConfig, config_path: std::path::PathBuf) -> Result<()> {
    // reqwest is built against `rustls-no-provider`, so nothing in the
    // process can make a TLS connection (OIDC discovery, JWKS, token
    // exchange) until a process-wide crypto provider is installed.
    INIT_RUSTLS.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .expect("no crypto provider installed yet");
    });

    let session_timeout = Duration::from_secs(config.session_timeout_secs);
    let bind_addr: SocketAddr = config
        .http
        .bind
        .parse()
        .wrap_err_with(|| format!("invalid http.bind address '{}'", config.http.bind))?;
    let tls = config.http.tls.as_ref().map(|t| TlsSettings {
        cert_path: t.cert_path.clone(),
        key_path: t.key_path.clone(),
    });

    let oidc = Arc::new(
        tokio::time::timeout(DISCOVERY_TIMEOUT, OidcEngine::discover(config.oidc.clone()))
            .await
            .map_err(|_elapsed| eyre::eyre!("OIDC discovery timed out after {DISCOVERY_TIMEOUT:?}"))?
            .wrap_err("OIDC discovery failed")?,
    );

    let registry = SessionRegistry::new();
    let orchestrator = Orchestrator::new(registry.clone(), oidc.clone(), session_timeout);

    let (config_tx, config_rx) = watch::channel(Arc::new(config.clone()));
    {
        let path = config_path.clone();
        tokio::spawn(async move {
            watch_config_file(path, config_tx).await;
        });
    }
    {
        let mut config_rx = config_rx.clone();
        let oidc = oidc.clone();
        tokio::spawn(async move {
            while config_rx.changed().await.is_ok() {
                let latest = config_rx.borrow().clone();
                oidc.update_policy(OidcPolicy::from(&latest.oidc));
            }
        });
    }

    let shutdown = Arc::new(Notify::new());
    let sweeper = spawn_sweeper(registry.clone());

    let ipc_task = tokio::spawn(ipc::serve(
        config.socket.path.clone(),
        orchestrator.clone(),
        shutdown.clone(),
    ));
    let http_task = tokio::spawn(http::serve(
        bind_addr,
        tls.as_ref(),
        orchestrator.clone(),
        shutdown.clone(),
    ));

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");
    shutdown.notify_waiters();
    sweeper.abort();

    let (ipc_result, http_result) = tokio::join!(ipc_task, http_task);
    ipc_result
        .wrap_err("local-socket server task panicked")?
        .wrap_err("local-socket server failed")?;
    http_result
        .wrap_err("callback http server task panicked")?
        .wrap_err("callback http server failed")?;

    Ok(())
}

/// Resolves when SIGTERM (Unix) or Ctrl-C (anywhere) is received.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
