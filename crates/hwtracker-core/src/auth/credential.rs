use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::token::{self, TokenClaims};
use super::AuthError;

/// Which identity provider issued a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Redirect-based OAuth/OIDC service
    ExternalRedirect,
    /// Backend login/register endpoint returning a JWT
    BearerToken,
}

/// The authenticated session's identity record.
///
/// A `Credential` is always fully populated: `new` rejects an empty token or
/// an empty subject name, so holders never see a half-built value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    subject_name: String,
    issued_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    provider: Provider,
}

impl Credential {
    /// Build a credential, taking issue/expiry times from the token payload
    /// when it can be decoded
    pub fn new(token: impl Into<String>, subject_name: impl Into<String>, provider: Provider) -> Result<Self, AuthError> {
        let token = token.into();
        let subject_name = subject_name.into().trim().to_string();

        if token.trim().is_empty() {
            return Err(AuthError::AuthenticationFailed(
                "provider returned an empty token".to_string(),
            ));
        }
        if subject_name.is_empty() {
            return Err(AuthError::AuthenticationFailed(
                "provider did not identify the account".to_string(),
            ));
        }

        let expires_at = match token::expiry(&token) {
            Ok(exp) => Some(exp),
            Err(e) => {
                debug!(error = %e, "Token carries no readable expiry");
                None
            }
        };
        Ok(Self {
            issued_at: TokenClaims::decode(&token).ok().and_then(|c| c.issued_at()),
            expires_at,
            token,
            subject_name,
            provider,
        })
    }

    /// Cap the expiry with one reported out of band (redirect callbacks carry
    /// `expires_in` next to the token). The earlier instant wins.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(match self.expires_at {
            Some(current) => current.min(expires_at),
            None => expires_at,
        });
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn subject_name(&self) -> &str {
        &self.subject_name
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Whether the credential is expired at `now`. Fails closed: with no
    /// known expiry the credential is expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => now >= exp,
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether a known expiry has passed at `now`. A credential without a
    /// readable expiry has not lapsed, though it is still [`is_expired_at`]
    /// and the periodic check will end it.
    ///
    /// [`is_expired_at`]: Self::is_expired_at
    pub fn has_lapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    pub fn has_lapsed(&self) -> bool {
        self.has_lapsed_at(Utc::now())
    }

    /// Minutes left before expiry, for display
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.expires_at
            .map(|exp| (exp - Utc::now()).num_minutes().max(0))
    }

    /// Upper-cased first letter of each word of the subject name
    pub fn initials(&self) -> String {
        self.subject_name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

// Keeps tokens out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("subject_name", &self.subject_name)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("provider", &self.provider)
            .finish()
    }
}

/// Derived session state, recomputed from the stored credential and the clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(Credential),
    Expired,
}

impl SessionState {
    pub fn from_credential(credential: Option<Credential>, now: DateTime<Utc>) -> Self {
        match credential {
            None => SessionState::Unauthenticated,
            Some(c) if c.has_lapsed_at(now) => SessionState::Expired,
            Some(c) => SessionState::Authenticated(c),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{make_token, token_expiring_in};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    #[test]
    fn test_new_rejects_empty_fields() {
        assert!(matches!(
            Credential::new("", "alice", Provider::BearerToken),
            Err(AuthError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            Credential::new("t1", "   ", Provider::BearerToken),
            Err(AuthError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_new_reads_times_from_token() {
        let token = make_token(json!({ "sub": "alice", "iat": 1_700_000_000, "exp": 1_700_086_400 }));
        let credential = Credential::new(token, "alice", Provider::BearerToken).unwrap();
        assert_eq!(credential.issued_at().unwrap().timestamp(), 1_700_000_000);
        assert_eq!(credential.expires_at().unwrap().timestamp(), 1_700_086_400);
    }

    #[test]
    fn test_expired_at_or_after_exp() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = make_token(json!({ "sub": "alice", "exp": 1_700_000_000 }));
        let credential = Credential::new(token, "alice", Provider::BearerToken).unwrap();

        assert!(credential.is_expired_at(now));
        assert!(credential.has_lapsed_at(now));
        assert!(!credential.is_expired_at(now - Duration::seconds(1)));
        assert!(!credential.has_lapsed_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_opaque_token_is_expired_but_not_lapsed() {
        for provider in [Provider::BearerToken, Provider::ExternalRedirect] {
            let credential = Credential::new("t1", "alice", provider).unwrap();
            assert!(credential.expires_at().is_none());
            assert!(credential.is_expired());
            assert!(!credential.has_lapsed());
        }
    }

    #[test]
    fn test_reported_expiry_applies_to_opaque_redirect_token() {
        let credential = Credential::new("opaque", "Alice", Provider::ExternalRedirect).unwrap();

        let live = credential.clone().with_expires_at(Utc::now() + Duration::minutes(5));
        assert!(!live.is_expired());
        assert!(!live.has_lapsed());

        let stale = credential.with_expires_at(Utc::now() - Duration::seconds(5));
        assert!(stale.is_expired());
        assert!(stale.has_lapsed());
    }

    #[test]
    fn test_reported_expiry_cannot_extend_token_exp() {
        let token = token_expiring_in(Duration::seconds(-10));
        let credential = Credential::new(token, "alice", Provider::ExternalRedirect)
            .unwrap()
            .with_expires_at(Utc::now() + Duration::hours(1));
        assert!(credential.is_expired());
        assert!(credential.has_lapsed());
    }

    #[test]
    fn test_initials() {
        let credential = Credential::new("t", "alice mary smith", Provider::ExternalRedirect).unwrap();
        assert_eq!(credential.initials(), "AMS");
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("secret-token", "alice", Provider::BearerToken).unwrap();
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("alice"));
    }

    #[test]
    fn test_session_state_from_credential() {
        let now = Utc::now();
        assert_eq!(SessionState::from_credential(None, now), SessionState::Unauthenticated);

        let live = Credential::new(token_expiring_in(Duration::hours(1)), "alice", Provider::BearerToken).unwrap();
        assert!(SessionState::from_credential(Some(live), now).is_authenticated());

        let stale = Credential::new(token_expiring_in(Duration::seconds(-10)), "alice", Provider::BearerToken).unwrap();
        assert_eq!(SessionState::from_credential(Some(stale), now), SessionState::Expired);

        // No readable expiry: signed in until the periodic check ends it
        let opaque = Credential::new("t1", "alice", Provider::BearerToken).unwrap();
        assert!(SessionState::from_credential(Some(opaque), now).is_authenticated());
    }
}
