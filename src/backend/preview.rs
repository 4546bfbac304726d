//! Unverified preview of backend token claims.
//!
//! The backend signs its tokens with a key this gateway does not hold. The
//! payload segment is decoded without any signature check, only to learn the
//! user id, email and role for display and for seeding our own signed
//! session. Nothing read here is trusted for access decisions until it has
//! been re-signed into a session.

use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use serde::{Deserialize, Deserializer};

use crate::roles::{self, Role};

/// Claims read from the backend token payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPreview {
    /// Subject (the user's email)
    #[serde(alias = "subject")]
    pub sub: String,
    #[serde(rename = "userId", deserialize_with = "string_or_number")]
    pub user_id: String,
    #[serde(default, with = "roles::lenient")]
    pub role: Option<Role>,
}

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("token does not have three segments")]
    Shape,
    #[error("payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid claims JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode the payload segment of a compact JWT without verifying it.
pub fn decode_token_preview(token: &str) -> Result<TokenPreview, PreviewError> {
    let mut segments = token.trim().split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => return Err(PreviewError::Shape),
    };

    // Some issuers keep the padding, most strip it.
    let bytes = if payload.ends_with('=') {
        URL_SAFE.decode(payload)?
    } else {
        URL_SAFE_NO_PAD.decode(payload)?
    };

    Ok(serde_json::from_slice(&bytes)?)
}

/// Accept ids sent either as JSON strings or numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) if !s.is_empty() => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number id, got {}",
            other
        ))),
    }
}
