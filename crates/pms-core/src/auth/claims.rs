//! Unverified inspection of bearer token claims.
//!
//! The payload segment is decoded purely to learn when the token expires.
//! Nothing here checks the signature, so the result must never be used to
//! decide whether a caller is who they claim to be.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Claims this client cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Decode the payload of a `header.payload.signature` token.
///
/// Returns `None` for anything that is not three segments, not base64url, not a
/// JSON object, or lacks a numeric `exp`.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    let payload = segments[1];
    if payload.is_empty() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .ok()?;

    let payload: Value = serde_json::from_slice(&bytes).ok()?;
    let claims = payload.as_object()?;
    let exp = claims.get("exp").and_then(Value::as_f64)?;
    if !exp.is_finite() {
        return None;
    }
    let expires_at = DateTime::from_timestamp_millis((exp * 1000.0) as i64)?;

    let subject = match claims.get("sub") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    Some(Claims {
        subject,
        expires_at,
    })
}

#[cfg(test)]
pub(crate) fn encode_token(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}
