//! Callback HTTP server: the short-URL redirect and the OIDC callback.
//!
//! Routing and middleware shape (request-id + trace layers via
//! `tower-http`, `tokio::select!` around the server future and a shutdown
//! signal) follow the daemon's other long-running server, the local-socket
//! listener in [`crate::ipc`]. TLS, when configured, loads an existing
//! cert/key pair through `axum-server`'s rustls integration; unlike a
//! browser-facing web UI this bridge never generates and persists a
//! self-signed certificate of its own — an operator who wants TLS here is
//! expected to supply real certs or terminate it at a reverse proxy.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path as AxPath, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use eyre::WrapErr as _;
use serde::Deserialize;
use tokio::sync::Notify;
use tower::ServiceBuilder;
use tower_http::ServiceBuilderExt as _;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::orchestrator::Orchestrator;

/// Cert/key pair for serving the callback endpoint over TLS.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Clone)]
struct AppState {
    orchestrator: Orchestrator,
}

fn router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .set_x_request_id(tower_http::request_id::MakeRequestUuid)
        .propagate_x_request_id()
        .trace_for_http()
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)));

    Router::new()
        .route("/auth/{state}", get(auth_redirect))
        .route("/callback", get(callback))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(middleware)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn auth_redirect(State(state): State<AppState>, AxPath(oidc_state): AxPath<String>) -> Response {
    match state.orchestrator.resolve_short_url(&oidc_state).await {
        Some(url) => Redirect::to(&url).into_response(),
        None => error_page(StatusCode::BAD_REQUEST, "This sign-in link is unknown or has expired."),
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    state: String,
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback(State(state): State<AppState>, Query(q): Query<CallbackQuery>) -> Response {
    let guard = VerdictGuard::new(state.orchestrator.clone(), q.state.clone());

    let outcome = if let Some(code) = q.code.as_deref() {
        state.orchestrator.complete_callback(&q.state, code).await
    } else if let Some(error) = q.error.as_deref() {
        let reason = q.error_description.as_deref().unwrap_or(error);
        state.orchestrator.fail_callback(&q.state, reason).await
    } else {
        // Leave the guard armed: whatever session this `state` names, if
        // any, still needs a verdict written even though this request itself
        // never named one.
        return error_page(StatusCode::BAD_REQUEST, "Request is missing both `code` and `error`.");
    };

    guard.defuse();
    match outcome {
        Ok(()) => success_page(),
        Err(reason) => error_page(StatusCode::BAD_REQUEST, &reason),
    }
}

/// Ensures the callback handler never returns (or unwinds) without a verdict
/// having been committed for the session its `state` names.
///
/// [`Orchestrator::complete_callback`] and [`Orchestrator::fail_callback`]
/// already commit a verdict on every normal return, so the ordinary path
/// calls [`Self::defuse`] right after awaiting one of them. If the handler
/// panics before that point, or returns early without reaching it, `Drop`
/// spawns a detached task that writes a generic failure verdict — but only
/// if the session is still there and nothing else has claimed it.
struct VerdictGuard {
    orchestrator: Orchestrator,
    state: String,
    armed: bool,
}

impl VerdictGuard {
    fn new(orchestrator: Orchestrator, state: String) -> Self {
        Self { orchestrator, state, armed: true }
    }

    fn defuse(mut self) {
        self.armed = false;
    }
}

impl Drop for VerdictGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let orchestrator = self.orchestrator.clone();
        let state = std::mem::take(&mut self.state);
        tokio::spawn(async move {
            orchestrator.write_safety_net_failure(&state).await;
        });
    }
}

fn success_page() -> Response {
    Html(
        "<!doctype html><title>Signed in</title>\
         <body><h1>Signed in</h1><p>You can close this window and return to your VPN client.</p></body>",
    )
    .into_response()
}

fn error_page(status: StatusCode, reason: &str) -> Response {
    let body = format!(
        "<!doctype html><title>Sign-in failed</title>\
         <body><h1>Sign-in failed</h1><p>{}</p></body>",
        html_escape(reason)
    );
    (status, Html(body)).into_response()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Serves the callback routes until `shutdown` is notified.
///
/// # Errors
///
/// Returns an error if the listener cannot bind, or if TLS is requested but
/// its certificate/key cannot be loaded.
pub async fn serve(
    bind_addr: SocketAddr,
    tls: Option<&TlsSettings>,
    orchestrator: Orchestrator,
    shutdown: Arc<Notify>,
) -> eyre::Result<()> {
    let app = router(AppState { orchestrator });

    match tls {
        Some(tls_cfg) => {
            #[cfg(feature = "tls")]
            {
                let rustls_cfg = load_tls_config(tls_cfg).await?;
                info!(%bind_addr, "callback server listening (tls)");
                let server = axum_server::bind_rustls(bind_addr, rustls_cfg).serve(app.into_make_service());
                tokio::select! {
                    res = server => res.wrap_err("callback server failed")?,
                    () = shutdown.notified() => info!("callback server shutting down"),
                }
            }
            #[cfg(not(feature = "tls"))]
            {
                let _ = tls_cfg;
                eyre::bail!("TLS was requested but this build was compiled without the `tls` feature");
            }
        }
        None => {
            info!(%bind_addr, "callback server listening (plain http)");
            let listener = tokio::net::TcpListener::bind(bind_addr)
                .await
                .wrap_err_with(|| format!("binding callback server to {bind_addr}"))?;
            let server = axum::serve(listener, app.into_make_service());
            tokio::select! {
                res = server => res.wrap_err("callback server failed")?,
                () = shutdown.notified() => info!("callback server shutting down"),
            }
        }
    }

    Ok(())
}

#[cfg(feature = "tls")]
async fn load_tls_config(tls: &TlsSettings) -> eyre::Result<axum_server::tls_rustls::RustlsConfig> {
    axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .wrap_err_with(|| {
            format!(
                "loading TLS cert/key from {} / {}",
                tls.cert_path.display(),
                tls.key_path.display()
            )
        })
}
