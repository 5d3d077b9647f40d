//! In-memory session registry tying a VPN connection attempt to an in-flight
//! OIDC exchange.
//!
//! A single lock-guarded map owned by one struct, with typed accessors
//! instead of letting callers reach into the map directly. No `watch`
//! channel: nothing outside the owning request handlers needs to observe
//! session changes, so a plain `RwLock` is enough and simpler.

mod sweeper;

pub use sweeper::spawn_sweeper;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;

use crate::error::SessionError;
use crate::util::random_hex;

/// Unique 64-hex-character session identifier.
pub type SessionId = String;
/// OIDC anti-CSRF `state` value; also the short-URL key.
pub type OidcState = String;

/// One VPN connection attempt and its associated OIDC exchange.
///
/// `state`, `code_verifier` and `nonce` start empty and are set exactly once
/// by [`SessionRegistry::bind_flow`].
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub state: OidcState,
    pub code_verifier: String,
    pub nonce: String,
    pub auth_url: String,
    pub username: String,
    pub common_name: String,
    pub untrusted_ip: String,
    pub untrusted_port: String,
    pub auth_control_file: PathBuf,
    pub auth_pending_file: PathBuf,
    pub auth_failed_reason_file: PathBuf,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    result_written: bool,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now > self.expires_at
    }

    #[must_use]
    pub fn result_written(&self) -> bool {
        self.result_written
    }
}

struct Inner {
    by_id: HashMap<SessionId, Session>,
    by_state: HashMap<OidcState, SessionId>,
}

/// Concurrent, lock-guarded session store. Cheaply cloneable (`Arc` inside).
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                by_id: HashMap::new(),
                by_state: HashMap::new(),
            })),
        }
    }

    /// Creates and inserts a fresh session with a new 64-hex id.
    ///
    /// Only the primary index is populated here; `state`/`code_verifier` are
    /// still empty and the secondary index entry is added by
    /// [`Self::bind_flow`].
    #[expect(clippy::too_many_arguments, reason = "mirrors the flat shape of the inbound auth request")]
    pub async fn create(
        &self,
        username: String,
        common_name: String,
        untrusted_ip: String,
        untrusted_port: String,
        auth_control_file: PathBuf,
        auth_pending_file: PathBuf,
        auth_failed_reason_file: PathBuf,
        session_timeout: Duration,
    ) -> Session {
        let now = SystemTime::now();
        let session = Session {
            id: random_hex(32),
            state: String::new(),
            code_verifier: String::new(),
            nonce: String::new(),
            auth_url: String::new(),
            username,
            common_name,
            untrusted_ip,
            untrusted_port,
            auth_control_file,
            auth_pending_file,
            auth_failed_reason_file,
            created_at: now,
            expires_at: now + session_timeout,
            result_written: false,
        };
        let mut guard = self.inner.write().await;
        guard.by_id.insert(session.id.clone(), session.clone());
        session
    }

    /// Attaches the OIDC `state`/PKCE verifier/nonce/authorization URL to an
    /// existing session and indexes it by `state`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session was deleted (e.g. by
    /// a concurrent sweep) before this call landed.
    pub async fn bind_flow(
        &self,
        id: &str,
        state: String,
        code_verifier: String,
        nonce: String,
        auth_url: String,
    ) -> Result<(), SessionError> {
        let mut guard = self.inner.write().await;
        let session = guard.by_id.get_mut(id).ok_or(SessionError::NotFound)?;
        session.state = state.clone();
        session.code_verifier = code_verifier;
        session.nonce = nonce;
        session.auth_url = auth_url;
        guard.by_state.insert(state, id.to_owned());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if unknown, [`SessionError::Expired`]
    /// if its deadline has already passed (the sweeper just hasn't reaped it yet).
    pub async fn get(&self, id: &str) -> Result<Session, SessionError> {
        let guard = self.inner.read().await;
        let session = guard.by_id.get(id).ok_or(SessionError::NotFound)?;
        if session.is_expired(SystemTime::now()) {
            return Err(SessionError::Expired);
        }
        Ok(session.clone())
    }

    /// # Errors
    ///
    /// Same as [`Self::get`], looked up via the secondary `state` index.
    pub async fn get_by_state(&self, state: &str) -> Result<Session, SessionError> {
        let guard = self.inner.read().await;
        let id = guard.by_state.get(state).ok_or(SessionError::NotFound)?;
        let session = guard.by_id.get(id).ok_or(SessionError::NotFound)?;
        if session.is_expired(SystemTime::now()) {
            return Err(SessionError::Expired);
        }
        Ok(session.clone())
    }

    /// Compare-and-set the one-shot "a verdict was written" flag.
    ///
    /// Returns `true` only if this call is the one that flipped it from
    /// `false` to `true`; callers must treat `false` as "someone else already
    /// committed a verdict, do not write the control file again."
    pub async fn mark_result_written(&self, id: &str) -> bool {
        let mut guard = self.inner.write().await;
        match guard.by_id.get_mut(id) {
            Some(session) if !session.result_written => {
                session.result_written = true;
                true
            }
            _ => false,
        }
    }

    /// Removes both index entries. Idempotent.
    pub async fn delete(&self, id: &str) {
        let mut guard = self.inner.write().await;
        if let Some(session) = guard.by_id.remove(id) {
            if !session.state.is_empty() {
                guard.by_state.remove(&session.state);
            }
        }
    }

    /// Observability only.
    pub async fn count(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    /// Returns the ids of every session whose deadline has passed, without
    /// mutating anything. Used by the sweeper, which then decides per-session
    /// whether a timeout verdict still needs writing before deleting it.
    pub(crate) async fn expired_ids(&self, now: SystemTime) -> Vec<Session> {
        let guard = self.inner.read().await;
        guard
            .by_id
            .values()
            .filter(|s| s.is_expired(now))
            .cloned()
            .collect()
    }
}
