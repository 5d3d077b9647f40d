use serde::{Deserialize, Serialize};

/// Discriminant literal that must equal `"auth_response"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    #[serde(rename = "auth_response")]
    AuthResponse,
}

/// Outcome of a single request/response exchange over the local socket.
///
/// The helper only cares about `status`: `"deferred"` means it should exit
/// with code 2 so `OpenVPN` waits on the pending file, anything else means
/// exit 1. `session_id` and `auth_url` are informational (e.g. for logging);
/// `error` carries a human-readable message when `status == "error"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Deferred,
    Error,
}

impl AuthResponse {
    #[must_use]
    pub fn deferred(session_id: String, auth_url: String) -> Self {
        Self {
            kind: ResponseKind::AuthResponse,
            status: ResponseStatus::Deferred,
            session_id: Some(session_id),
            auth_url: Some(auth_url),
            error: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::AuthResponse,
            status: ResponseStatus::Error,
            session_id: None,
            auth_url: None,
            error: Some(message.into()),
        }
    }

    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.status == ResponseStatus::Deferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_round_trips() {
        let resp = AuthResponse::deferred("sess1".to_owned(), "https://x/auth/abc".to_owned());
        let json = serde_json::to_string(&resp).unwrap();
        let back: AuthResponse = serde_json::from_str(&json).unwrap();
        assert!(back.is_deferred());
        assert_eq!(back.session_id.as_deref(), Some("sess1"));
    }

    #[test]
    fn error_response_omits_session_fields() {
        let resp = AuthResponse::error("unsupported client");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("session_id"));
        assert!(!json.contains("auth_url"));
        assert!(!resp.is_deferred());
    }
}
