//! Dotted-path claim resolution over a dynamically typed claims tree.
//!
//! The set of claims an OIDC provider emits isn't known ahead of
//! time, so claims are kept as a `serde_json::Value` tree instead of a fixed
//! struct, and `realm_access.roles`-style paths are walked by hand.

use serde_json::Value;

use crate::error::OidcError;

/// Walks a dot-separated path (e.g. `realm_access.roles`) into a claims tree.
///
/// Returns `None` if any path segment is missing or the tree isn't an object
/// at that point.
pub fn resolve_path<'a>(claims: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = claims;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Coerces a JSON array into a list of strings, accepting arrays of strings
/// or arrays of other scalar JSON values (coerced via their string form).
fn coerce_string_array(value: &Value) -> Option<Vec<String>> {
    let array = value.as_array()?;
    array
        .iter()
        .map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect()
}

/// Validates that `claims` grants at least one of `required_roles` under
/// `role_claim`. Passes trivially if `required_roles` is empty.
///
/// # Errors
///
/// Returns [`OidcError::RoleDenied`] if the resolved claim is missing, isn't
/// an array of (coercible) strings, or shares no element with `required_roles`.
pub fn validate_roles(
    claims: &Value,
    role_claim: &str,
    required_roles: &[String],
) -> Result<(), OidcError> {
    if required_roles.is_empty() {
        return Ok(());
    }
    let have = resolve_path(claims, role_claim)
        .and_then(coerce_string_array)
        .unwrap_or_default();
    let grants_any = required_roles.iter().any(|needed| have.contains(needed));
    if grants_any {
        Ok(())
    } else {
        Err(OidcError::RoleDenied {
            have,
            need: required_roles.to_vec(),
        })
    }
}

/// Validates the username claim matches `expected`.
///
/// # Errors
///
/// Returns [`OidcError::UsernameMissing`] if `username_claim` isn't present
/// or isn't a string, [`OidcError::UsernameMismatch`] if it doesn't equal
/// `expected`.
pub fn validate_username(
    claims: &Value,
    username_claim: &str,
    expected: &str,
) -> Result<(), OidcError> {
    let actual = resolve_path(claims, username_claim)
        .and_then(Value::as_str)
        .ok_or_else(|| OidcError::UsernameMissing {
            claim: username_claim.to_owned(),
        })?;
    if actual == expected {
        Ok(())
    } else {
        Err(OidcError::UsernameMismatch {
            claim: username_claim.to_owned(),
            actual: actual.to_owned(),
            expected: expected.to_owned(),
        })
    }
}

/// Best-effort merge of role-bearing keys from the access-token payload into
/// `claims`, skipping any key already present on the ID token.
///
/// Some providers (Keycloak) only put client-role
/// information on the access token, not the ID token. This must never
/// overwrite an existing claim and must be silent about malformed input.
pub fn merge_access_token_role_claims(claims: &mut Value, access_token_payload: &Value) {
    const ROLE_BEARING_KEYS: [&str; 3] = ["resource_access", "realm_access", "groups"];
    let Some(claims_obj) = claims.as_object_mut() else {
        return;
    };
    let Some(payload_obj) = access_token_payload.as_object() else {
        return;
    };
    for key in ROLE_BEARING_KEYS {
        if claims_obj.contains_key(key) {
            continue;
        }
        if let Some(value) = payload_obj.get(key) {
            claims_obj.insert(key.to_owned(), value.clone());
        }
    }
}
