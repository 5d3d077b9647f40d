//! Glues the session registry, OIDC engine, and control-file writer together
//! This is the only module that calls all three.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, instrument, warn};
use url::Url;

use oidc_bridge_common::{AuthRequest, AuthResponse, PendingAuthMethod};

use crate::control_file;
use crate::error::OrchestratorError;
use crate::oidc::OidcEngine;
use crate::session::SessionRegistry;

/// Everything a single daemon instance needs to service both ingress paths.
#[derive(Clone)]
pub struct Orchestrator {
    registry: SessionRegistry,
    oidc: std::sync::Arc<OidcEngine>,
    session_timeout: Duration,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        registry: SessionRegistry,
        oidc: std::sync::Arc<OidcEngine>,
        session_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            oidc,
            session_timeout,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Handles one inbound request from the helper.
    ///
    /// Never returns an OIDC error: by the time OIDC errors can occur the
    /// helper has already exited with a deferred status. Only IPC-layer
    /// failures (bad input, unsupported client, URL too long) reach the
    /// response this function returns.
    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn handle_auth_request(&self, req: AuthRequest) -> AuthResponse {
        match self.try_handle_auth_request(req).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, "auth request failed");
                AuthResponse::error(err.to_string())
            }
        }
    }

    async fn try_handle_auth_request(
        &self,
        req: AuthRequest,
    ) -> Result<AuthResponse, OrchestratorError> {
        // Selection against `IV_SSO` already happened in the helper (the only
        // place that sees the raw capability list); the wire protocol only
        // ever carries the resolved method. `UnsupportedClient` therefore
        // never arises here in practice, it exists so this error kind has
        // somewhere to live if a future caller ever forwards an unresolved
        // request.
        let method = req.pending_auth_method;

        let session = self
            .registry
            .create(
                req.username.clone(),
                req.common_name.clone(),
                req.untrusted_ip.clone(),
                req.untrusted_port.clone(),
                PathBuf::from(&req.auth_control_file),
                PathBuf::from(&req.auth_pending_file),
                PathBuf::from(&req.auth_failed_reason_file),
                self.session_timeout,
            )
            .await;

        match self.start_and_commit_flow(&session.id, &req, method).await {
            Ok(short_url) => Ok(AuthResponse::deferred(session.id, short_url)),
            Err(err) => {
                self.rollback(&session.id, &req).await;
                Err(err)
            }
        }
    }

    async fn start_and_commit_flow(
        &self,
        session_id: &str,
        req: &AuthRequest,
        method: PendingAuthMethod,
    ) -> Result<String, OrchestratorError> {
        let flow = self.oidc.start_flow();
        let short_url = build_short_url(&self.oidc.settings().redirect_uri, &flow.state)
            .map_err(OrchestratorError::InvalidRedirectUri)?;

        let web_auth_line = format!("WEB_AUTH::{short_url}\n");
        if web_auth_line.len() > control_file::MAX_WEB_AUTH_LINE_BYTES {
            return Err(OrchestratorError::UrlTooLong);
        }

        self.registry
            .bind_flow(session_id, flow.state, flow.code_verifier, flow.nonce, flow.auth_url)
            .await?;

        control_file::write_pending(
            Path::new(&req.auth_pending_file),
            self.session_timeout.as_secs().try_into().unwrap_or(i64::MAX),
            method.as_str(),
            &short_url,
        )?;

        info!(session_id, method = method.as_str(), "wrote pending auth file");
        Ok(short_url)
    }

    /// Best-effort cleanup when any step of flow setup fails: deletes the
    /// session and writes a generic failure verdict so the VPN server does
    /// not hang until its own timeout.
    async fn rollback(&self, session_id: &str, req: &AuthRequest) {
        if self.registry.mark_result_written(session_id).await {
            if let Err(err) = control_file::write_failure(
                Path::new(&req.auth_control_file),
                Path::new(&req.auth_failed_reason_file),
                "unable to start authentication",
            ) {
                warn!(session_id, %err, "rollback failed to write failure verdict");
            }
        }
        self.registry.delete(session_id).await;
    }

    /// Completes a successful short-URL lookup for `GET /auth/<state>`.
    pub async fn resolve_short_url(&self, state: &str) -> Option<String> {
        let session = self.registry.get_by_state(state).await.ok()?;
        if session.auth_url.is_empty() {
            None
        } else {
            Some(session.auth_url)
        }
    }

    /// Completes the OIDC callback for a given `state` after the provider
    /// reported success. Performs token exchange, role
    /// validation, and optional username validation, then commits exactly
    /// one verdict under the CAS guard.
    ///
    /// Returns `Ok(())` on an accepted verdict, `Err(message)` with a
    /// human-readable reason on a rejected one. Both cases have already
    /// written the control files; the return value only selects which page
    /// the HTTP layer renders.
    #[instrument(skip(self, code))]
    pub async fn complete_callback(&self, state: &str, code: &str) -> Result<(), String> {
        let session = match self.registry.get_by_state(state).await {
            Ok(session) => session,
            Err(err) => return Err(err.to_string()),
        };

        let outcome = self
            .exchange_and_validate(code, &session.code_verifier, &session.nonce, &session.username)
            .await;
        self.commit_verdict(&session.id, &session.auth_control_file, &session.auth_failed_reason_file, outcome)
            .await
    }

    /// Completes the callback when the provider itself reported an error
    /// (`?error=...&error_description=...`).
    pub async fn fail_callback(&self, state: &str, reason: &str) -> Result<(), String> {
        let session = match self.registry.get_by_state(state).await {
            Ok(session) => session,
            Err(err) => return Err(err.to_string()),
        };
        self.commit_verdict(
            &session.id,
            &session.auth_control_file,
            &session.auth_failed_reason_file,
            Err(reason.to_owned()),
        )
        .await
    }

    async fn exchange_and_validate(
        &self,
        code: &str,
        code_verifier: &str,
        expected_nonce: &str,
        expected_username: &str,
    ) -> Result<(), String> {
        let claims = self
            .oidc
            .exchange(code, code_verifier, expected_nonce)
            .await
            .map_err(|err| err.to_string())?;
        self.oidc.validate_roles(&claims).map_err(|err| err.to_string())?;
        self.oidc
            .validate_username(&claims, expected_username)
            .map_err(|err| err.to_string())?;
        Ok(())
    }

    /// Last-resort cleanup the HTTP layer invokes on every callback exit
    /// path, including an unwind from a panic. A no-op unless `state` still
    /// names a session with no verdict committed yet, in which case it
    /// writes a generic failure so the VPN server is never left waiting on
    /// its own timeout because this process hit a bug.
    pub async fn write_safety_net_failure(&self, state: &str) {
        let Ok(session) = self.registry.get_by_state(state).await else {
            return;
        };
        if !self.registry.mark_result_written(&session.id).await {
            return;
        }
        if let Err(err) = control_file::write_failure(
            &session.auth_control_file,
            &session.auth_failed_reason_file,
            "Internal error",
        ) {
            warn!(session_id = %session.id, %err, "safety net failed to write failure verdict");
        }
        self.registry.delete(&session.id).await;
    }

    /// Writes exactly one verdict for `session_id`, guarded by the
    /// single-shot CAS, and returns whichever result the caller should
    /// render.
    async fn commit_verdict(
        &self,
        session_id: &str,
        control_path: &std::path::Path,
        reason_path: &std::path::Path,
        outcome: Result<(), String>,
    ) -> Result<(), String> {
        if !self.registry.mark_result_written(session_id).await {
            // Sweeper or another callback already committed a verdict for
            // this session: log and skip.
            warn!(session_id, "verdict already written; skipping callback result");
            self.registry.delete(session_id).await;
            return outcome;
        }

        let write_result = match &outcome {
            Ok(()) => control_file::write_success(control_path),
            Err(reason) => control_file::write_failure(control_path, reason_path, reason),
        };
        if let Err(err) = write_result {
            warn!(session_id, %err, "failed to write callback verdict");
        }
        self.registry.delete(session_id).await;
        outcome
    }
}

/// Builds the short redirect URL: same scheme/host/port/base
/// path as `redirect_uri`, with the final path segment replaced by
/// `auth/<state>` and any query/fragment stripped.
fn build_short_url(redirect_uri: &str, state: &str) -> Result<String, String> {
    let mut url = Url::parse(redirect_uri).map_err(|err| err.to_string())?;
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| "redirect_uri cannot be a base".to_owned())?;
        segments.pop_if_empty();
        segments.pop();
        segments.push("auth");
        segments.push(state);
    }
    Ok(url.to_string())
}
