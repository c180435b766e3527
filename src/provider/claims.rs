//! # Claim Decoder
//!
//! Reads the payload segment of a compact bearer token to recover its expiry.
//! The signature is never verified: the result is used for renewal bookkeeping
//! only and must not feed any trust decision.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("invalid token format")]
    InvalidFormat,

    #[error("error decoding payload: {0}")]
    Payload(String),

    #[error("error parsing claims: {0}")]
    Claims(String),

    #[error("{0} claim not found or wrong type")]
    Missing(&'static str),
}

/// Optional registered claims of a token payload.
///
/// Every claim is kept as raw JSON so a mistyped claim only fails its own accessor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    exp: Option<Value>,
    #[serde(default)]
    iss: Option<Value>,
    #[serde(default)]
    sub: Option<Value>,
}

impl TokenClaims {
    /// Decode the claims of a `header.payload.signature` token
    pub fn decode(token: &str) -> Result<Self, ClaimError> {
        let segments: Vec<&str> = token.split('.').collect();
        let [_, payload, _] = segments.as_slice() else {
            return Err(ClaimError::InvalidFormat);
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| ClaimError::Payload(e.to_string()))?;
        let claims: serde_json::Map<String, Value> =
            serde_json::from_slice(&bytes).map_err(|e| ClaimError::Claims(e.to_string()))?;
        serde_json::from_value(Value::Object(claims))
            .map_err(|e| ClaimError::Claims(e.to_string()))
    }

    /// `exp` as an absolute UTC instant
    #[allow(
        clippy::cast_possible_truncation,
        reason = "fractional expiry seconds are truncated like NumericDate consumers do"
    )]
    pub fn expires_at(&self) -> Result<DateTime<Utc>, ClaimError> {
        let seconds = self
            .exp
            .as_ref()
            .and_then(|exp| exp.as_i64().or_else(|| exp.as_f64().map(|f| f.trunc() as i64)))
            .ok_or(ClaimError::Missing("exp"))?;
        DateTime::from_timestamp(seconds, 0).ok_or(ClaimError::Missing("exp"))
    }

    /// `iss` claim
    pub fn issuer(&self) -> Result<&str, ClaimError> {
        self.iss
            .as_ref()
            .and_then(Value::as_str)
            .ok_or(ClaimError::Missing("iss"))
    }

    /// `sub` claim
    pub fn subject(&self) -> Result<&str, ClaimError> {
        self.sub
            .as_ref()
            .and_then(Value::as_str)
            .ok_or(ClaimError::Missing("sub"))
    }
}
