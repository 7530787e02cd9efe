//! JWT payload decoding.
//!
//! Only the payload segment is read. Signatures are the backend's concern;
//! the client uses the claims for display and for expiry checks, and treats
//! anything it cannot decode as expired.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use super::AuthError;

/// Claims that may carry a display name, in order of preference
const NAME_CLAIMS: [&str; 4] = ["name", "preferred_username", "email", "sub"];

/// Decoded claims of a JWT payload
#[derive(Debug, Clone)]
pub struct TokenClaims {
    claims: Map<String, Value>,
}

impl TokenClaims {
    /// Decode the payload of a three-segment dot-delimited token
    pub fn decode(token: &str) -> Result<Self, AuthError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(AuthError::TokenMalformed(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        }

        let payload = segments[1].trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| STANDARD_NO_PAD.decode(payload))
            .map_err(|e| AuthError::TokenMalformed(format!("payload is not base64: {}", e)))?;

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(claims)) => Ok(Self { claims }),
            Ok(_) => Err(AuthError::TokenMalformed("payload is not a JSON object".to_string())),
            Err(e) => Err(AuthError::TokenMalformed(format!("payload is not JSON: {}", e))),
        }
    }

    /// `exp` claim; `Err` when missing or not a usable number
    pub fn expires_at(&self) -> Result<DateTime<Utc>, AuthError> {
        self.timestamp("exp")
            .ok_or_else(|| AuthError::TokenMalformed("missing or invalid exp claim".to_string()))
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("iat")
    }

    /// Best display name the token carries
    pub fn subject_name(&self) -> Option<&str> {
        NAME_CLAIMS
            .iter()
            .filter_map(|claim| self.get_str(claim))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    pub fn get_str(&self, claim: &str) -> Option<&str> {
        self.claims.get(claim).and_then(Value::as_str)
    }

    /// Claims are seconds since the epoch; fractional seconds are kept
    fn timestamp(&self, claim: &str) -> Option<DateTime<Utc>> {
        let seconds = self.claims.get(claim)?.as_f64()?;
        if !seconds.is_finite() {
            return None;
        }
        Utc.timestamp_millis_opt((seconds * 1000.0) as i64).single()
    }
}

/// Expiry instant of a token. Callers treat `Err` as already expired.
pub fn expiry(token: &str) -> Result<DateTime<Utc>, AuthError> {
    TokenClaims::decode(token)?.expires_at()
}

// ============================================================================
// Tests
// ============================================================================
