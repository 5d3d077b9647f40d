//! OIDC authorization-code + PKCE engine.
//!
//! Discovery via `openidconnect::core::CoreProviderMetadata` and an
//! `oauth2-reqwest` transport, `CoreClient::from_provider_metadata` /
//! `set_auth_uri` / `set_token_uri` construction, and an
//! `exchange_code().set_pkce_verifier().request_async()` exchange.
//!
//! One departure from a typical browser-login OIDC client: `state` is not
//! `CsrfToken::new_random` but a hand-rolled 32-hex string (16 random bytes),
//! because it doubles as the path segment of the short URL handed to the VPN
//! client and its exact shape is fixed. The nonce, by contrast, is a regular
//! `Nonce::new_random` handed to `authorize_url`; since this bridge has no
//! browser session to stash it in a cookie, the session registry carries it
//! instead (alongside `state`/`code_verifier`) and `exchange` verifies the
//! ID token against that stored value, the same as the teacher verifies
//! against its nonce cookie.

pub mod claims;

use std::sync::Arc;

use oauth2_reqwest::ReqwestClient;
use openidconnect::core::{
    CoreAuthenticationFlow, CoreClient, CoreIdToken, CoreProviderMetadata,
};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointMaybeSet, EndpointNotSet,
    EndpointSet, IssuerUrl, Nonce, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
};
use reqwest::redirect::Policy;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::error::OidcError;

/// Statically configured OIDC relying-party settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcSettings {
    pub issuer: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<SecretString>,
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub required_roles: Vec<String>,
    #[serde(default = "default_role_claim")]
    pub role_claim: String,
    #[serde(default = "default_username_claim")]
    pub username_claim: String,
    /// When `true`, `validate_username` is never called — the `IV_SSO`
    /// username is trusted to already match whatever the VPN server
    /// collected.
    #[serde(default)]
    pub allow_username_mismatch: bool,
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_owned(), "profile".to_owned()]
}

fn default_role_claim() -> String {
    "realm_access.roles".to_owned()
}

fn default_username_claim() -> String {
    "preferred_username".to_owned()
}

/// The subset of [`OidcSettings`] the config watcher may republish while the
/// daemon is running: scopes requested on the next flow, and the role/claim
/// requirements checked on the next callback. Issuer, client credentials and
/// redirect URI are fixed at discovery time, same as the socket path and HTTP
/// bind address.
#[derive(Debug, Clone)]
pub struct OidcPolicy {
    pub scopes: Vec<String>,
    pub required_roles: Vec<String>,
    pub role_claim: String,
    pub username_claim: String,
    pub allow_username_mismatch: bool,
}

impl From<&OidcSettings> for OidcPolicy {
    fn from(settings: &OidcSettings) -> Self {
        Self {
            scopes: settings.scopes.clone(),
            required_roles: settings.required_roles.clone(),
            role_claim: settings.role_claim.clone(),
            username_claim: settings.username_claim.clone(),
            allow_username_mismatch: settings.allow_username_mismatch,
        }
    }
}

/// Fully-configured OIDC client type: auth and token endpoints come from
/// discovery and are always set, userinfo may or may not be advertised,
/// device-auth/introspection/revocation never are.
type OidcClientReady = CoreClient<
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
    EndpointMaybeSet,
>;

/// Result of starting a new authorization-code flow.
pub struct StartedFlow {
    pub state: String,
    pub code_verifier: String,
    pub nonce: String,
    pub auth_url: String,
}

/// Claims merged from the ID token and (best-effort) the access token.
pub type Claims = Value;

/// A discovered, ready-to-use OIDC relying party.
pub struct OidcEngine {
    client: OidcClientReady,
    http: reqwest::Client,
    settings: Arc<OidcSettings>,
    /// Guarded with a blocking `std::sync::RwLock`, not the async kind: reads
    /// and writes are both pointer-swap-cheap and never held across an
    /// `.await`.
    policy: std::sync::RwLock<Arc<OidcPolicy>>,
}

impl OidcEngine {
    /// Runs OIDC discovery against `settings.issuer` and builds a client
    /// with a fixed redirect URI.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::Discovery`] if discovery fails or the provider is
    /// missing a token endpoint.
    pub async fn discover(settings: OidcSettings) -> Result<Self, OidcError> {
        let http = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|err| OidcError::Discovery(err.to_string()))?;

        let issuer = IssuerUrl::new(settings.issuer.clone())
            .map_err(|err| OidcError::Discovery(format!("invalid issuer URL: {err}")))?;
        let metadata = CoreProviderMetadata::discover_async(issuer, &ReqwestClient::from(http.clone()))
            .await
            .map_err(|err| OidcError::Discovery(err.to_string()))?;

        let redirect_uri = RedirectUrl::new(settings.redirect_uri.clone())
            .map_err(|err| OidcError::Discovery(format!("invalid redirect_uri: {err}")))?;

        let client_secret = settings
            .client_secret
            .as_ref()
            .map(|s| ClientSecret::new(s.expose_secret().to_owned()));

        let client = CoreClient::from_provider_metadata(
            metadata.clone(),
            ClientId::new(settings.client_id.clone()),
            client_secret,
        )
        .set_auth_uri(metadata.authorization_endpoint().clone());
        let client = match metadata.token_endpoint().cloned() {
            Some(token_url) => client.set_token_uri(token_url),
            None => return Err(OidcError::Discovery("provider has no token endpoint".into())),
        }
        .set_redirect_uri(redirect_uri);

        let policy = std::sync::RwLock::new(Arc::new(OidcPolicy::from(&settings)));
        Ok(Self {
            client,
            http,
            settings: Arc::new(settings),
            policy,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &OidcSettings {
        &self.settings
    }

    #[must_use]
    pub fn policy(&self) -> Arc<OidcPolicy> {
        #[expect(clippy::unwrap_used, reason = "lock is only ever held briefly and never while panicking")]
        self.policy.read().unwrap().clone()
    }

    /// Swaps in a reloaded policy. Called by the config watcher when the
    /// underlying file changes; scopes take effect on the next
    /// [`Self::start_flow`], role/claim requirements on the next callback.
    pub fn update_policy(&self, policy: OidcPolicy) {
        #[expect(clippy::unwrap_used, reason = "lock is only ever held briefly and never while panicking")]
        let mut guard = self.policy.write().unwrap();
        *guard = Arc::new(policy);
    }

    /// Starts a fresh authorization-code + PKCE flow.
    ///
    /// `state` is a hand-rolled 32-hex string rather than the library's own
    /// CSRF token, to satisfy the exact-format requirement (it is also
    /// used as the short-URL path segment).
    #[must_use]
    pub fn start_flow(&self) -> StartedFlow {
        let state = crate::util::random_hex(16);
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let policy = self.policy();

        let state_for_closure = state.clone();
        let mut authorize = self.client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            move || CsrfToken::new(state_for_closure.clone()),
            Nonce::new_random,
        );
        for scope in &policy.scopes {
            authorize = authorize.add_scope(Scope::new(scope.clone()));
        }
        let (auth_url, _csrf_token, nonce) = authorize.set_pkce_challenge(pkce_challenge).url();

        StartedFlow {
            state,
            code_verifier: pkce_verifier.secret().clone(),
            nonce: nonce.secret().clone(),
            auth_url: auth_url.to_string(),
        }
    }

    /// Exchanges an authorization code for tokens, verifies the ID token
    /// against `expected_nonce` (the value [`Self::start_flow`] generated for
    /// this session), and returns its claims merged with any role-bearing
    /// claims found only on the access token.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::TokenExchange`] if the exchange request fails,
    /// [`OidcError::NoIdToken`] if the response carries no ID token, and
    /// [`OidcError::TokenVerification`] if signature/issuer/audience/expiry/
    /// nonce checks fail.
    pub async fn exchange(
        &self,
        code: &str,
        code_verifier: &str,
        expected_nonce: &str,
    ) -> Result<Claims, OidcError> {
        let request = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_owned()))
            .map_err(|err| OidcError::TokenExchange(err.to_string()))?
            .set_pkce_verifier(PkceCodeVerifier::new(code_verifier.to_owned()));

        let token_response = request
            .request_async(&ReqwestClient::from(self.http.clone()))
            .await
            .map_err(|err| OidcError::TokenExchange(err.to_string()))?;

        let id_token: &CoreIdToken = token_response
            .extra_fields()
            .id_token()
            .ok_or(OidcError::NoIdToken)?;

        id_token
            .claims(
                &self.client.id_token_verifier(),
                &Nonce::new(expected_nonce.to_owned()),
            )
            .map_err(|err| OidcError::TokenVerification(err.to_string()))?;

        let mut claims = decode_jwt_payload(&id_token.to_string())
            .map_err(|err| OidcError::TokenVerification(format!("decoding verified id_token: {err}")))?;

        use openidconnect::TokenResponse as _;
        if let Ok(access_claims) = decode_jwt_payload(token_response.access_token().secret()) {
            claims::merge_access_token_role_claims(&mut claims, &access_claims);
        }

        Ok(claims)
    }

    /// # Errors
    ///
    /// See [`claims::validate_roles`].
    pub fn validate_roles(&self, claims: &Claims) -> Result<(), OidcError> {
        let policy = self.policy();
        claims::validate_roles(claims, &policy.role_claim, &policy.required_roles)
    }

    /// No-op when `allow_username_mismatch` is set.
    ///
    /// # Errors
    ///
    /// See [`claims::validate_username`].
    pub fn validate_username(&self, claims: &Claims, expected: &str) -> Result<(), OidcError> {
        let policy = self.policy();
        if policy.allow_username_mismatch {
            return Ok(());
        }
        claims::validate_username(claims, &policy.username_claim, expected)
    }
}

/// Decodes the payload segment of a compact JWT without checking its
/// signature. Only ever called on tokens whose signature was already
/// verified by [`OidcEngine::exchange`] (for the ID token) or on a
/// best-effort basis for the access token, which this bridge never trusts
/// for anything beyond opportunistically reading already-granted role claims.
fn decode_jwt_payload(jwt: &str) -> Result<Value, OidcError> {
    use base64::Engine as _;

    let payload_segment = jwt
        .split('.')
        .nth(1)
        .ok_or_else(|| OidcError::TokenVerification("token is not a compact JWT".into()))?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_segment)
        .map_err(|err| OidcError::TokenVerification(format!("invalid base64 payload: {err}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| OidcError::TokenVerification(format!("invalid JSON payload: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_jwt_payload_reads_claims() {
        let header = base64_url("{\"alg\":\"none\"}");
        let payload = base64_url("{\"sub\":\"abc\",\"exp\":123}");
        let jwt = format!("{header}.{payload}.");
        let claims = decode_jwt_payload(&jwt).unwrap();
        assert_eq!(claims["sub"], "abc");
        assert_eq!(claims["exp"], 123);
    }

    #[test]
    fn decode_jwt_payload_rejects_non_jwt() {
        assert!(decode_jwt_payload("not-a-jwt").is_err());
    }

    fn base64_url(s: &str) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(s.as_bytes())
    }
}
