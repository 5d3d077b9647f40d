use serde::{Deserialize, Serialize};

/// The two deferred-auth methods an `OpenVPN` client may advertise via `IV_SSO`.
///
/// `webauth` lets the server hand back a URL the client's own UI opens;
/// `openurl` asks the client to open the URL in the system browser directly.
/// The daemon must echo back whichever one the client advertised — it cannot
/// invent a method the client didn't offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingAuthMethod {
    Webauth,
    Openurl,
}

impl PendingAuthMethod {
    /// The literal token written into the pending file's second line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Webauth => "webauth",
            Self::Openurl => "openurl",
        }
    }

    /// Picks the method the daemon should use from a client's advertised
    /// `IV_SSO` capability list, preferring `webauth` over `openurl`.
    #[must_use]
    pub fn select(capabilities: &[String]) -> Option<Self> {
        let has = |name: &str| capabilities.iter().any(|c| c.eq_ignore_ascii_case(name));
        if has("webauth") {
            Some(Self::Webauth)
        } else if has("openurl") {
            Some(Self::Openurl)
        } else {
            None
        }
    }
}

/// Discriminant literal that must equal `"auth_request"`.
///
/// Deserializing any other value into this unit enum fails, which is how the
/// local-socket server rejects a request whose `type` doesn't match what it
/// expects without hand-rolled string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    #[serde(rename = "auth_request")]
    AuthRequest,
}

/// Request sent by the helper for every VPN connection attempt.
///
/// Field names match the `OpenVPN` deferred-auth environment variables
/// verbatim (`untrusted_ip`, `auth_control_file`, ...) so the helper can
/// forward them with no renaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub username: String,
    pub common_name: String,
    pub untrusted_ip: String,
    pub untrusted_port: String,
    pub auth_control_file: String,
    pub auth_pending_file: String,
    pub auth_failed_reason_file: String,
    pub pending_auth_method: PendingAuthMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_prefers_webauth() {
        let caps = vec!["openurl".to_owned(), "webauth".to_owned()];
        assert_eq!(
            PendingAuthMethod::select(&caps),
            Some(PendingAuthMethod::Webauth)
        );
    }

    #[test]
    fn select_falls_back_to_openurl() {
        let caps = vec!["openurl".to_owned()];
        assert_eq!(
            PendingAuthMethod::select(&caps),
            Some(PendingAuthMethod::Openurl)
        );
    }

    #[test]
    fn select_none_when_unsupported() {
        let caps = vec!["totp".to_owned()];
        assert_eq!(PendingAuthMethod::select(&caps), None);
    }

    #[test]
    fn request_round_trips_through_json() {
        let req = AuthRequest {
            kind: RequestKind::AuthRequest,
            username: "alice".to_owned(),
            common_name: String::new(),
            untrusted_ip: "10.0.0.5".to_owned(),
            untrusted_port: "53621".to_owned(),
            auth_control_file: "/tmp/ac".to_owned(),
            auth_pending_file: "/tmp/ap".to_owned(),
            auth_failed_reason_file: "/tmp/ar".to_owned(),
            pending_auth_method: PendingAuthMethod::Webauth,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"type\":\"auth_request\""));
        let back: AuthRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.username, "alice");
        assert_eq!(back.pending_auth_method, PendingAuthMethod::Webauth);
    }

    #[test]
    fn wrong_type_tag_fails_to_deserialize() {
        let json = r#"{"type":"something_else","username":"a","common_name":"","untrusted_ip":"","untrusted_port":"","auth_control_file":"","auth_pending_file":"","auth_failed_reason_file":"","pending_auth_method":"webauth"}"#;
        assert!(serde_json::from_str::<AuthRequest>(json).is_err());
    }
}
