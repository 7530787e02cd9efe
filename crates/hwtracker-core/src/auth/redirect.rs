//! Redirect-based sign-in against an external OAuth2/OIDC service.
//!
//! `sign_in` produces the provider URL and the application hands control to
//! it. The provider sends the user back to the configured redirect URI with
//! either a token or an error in the URL fragment; the host passes that URL
//! in with [`ExternalRedirectProvider::set_callback`] and the next
//! `SessionManager::initialize` consumes it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use url::Url;

use super::provider::ProviderSignIn;
use super::token::TokenClaims;
use super::{AuthError, Credential, IdentityProvider, Provider, SignInOptions};

const AUTHORIZE_PATH: &str = "oauth2/v2.0/authorize";
const LOGOUT_PATH: &str = "oauth2/v2.0/logout";

#[derive(Debug, Clone)]
pub struct RedirectSettings {
    /// Provider base, e.g. `https://tenant.b2clogin.com/tenant.onmicrosoft.com/B2C_1_signupsignin`
    pub authority: Url,
    pub client_id: String,
    pub scopes: Vec<String>,
    /// Where the provider sends the user back to
    pub redirect_uri: Url,
    /// Where the provider sends the user after ending its session
    pub post_logout_redirect_uri: Option<Url>,
}

pub struct ExternalRedirectProvider {
    settings: RedirectSettings,
    pending_callback: Mutex<Option<Url>>,
}

impl ExternalRedirectProvider {
    pub fn new(settings: RedirectSettings) -> Self {
        Self {
            settings,
            pending_callback: Mutex::new(None),
        }
    }

    /// Record the URL the application was re-entered with
    pub fn set_callback(&self, url: Url) {
        *self.pending_callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(url);
    }

    pub fn with_callback(self, url: Url) -> Self {
        self.set_callback(url);
        self
    }

    fn provider_url(&self, path: &str) -> Result<Url, AuthError> {
        let base = self.settings.authority.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, path))
            .map_err(|e| AuthError::AuthenticationFailed(format!("Invalid provider authority: {}", e)))
    }

    pub fn authorize_url(&self) -> Result<Url, AuthError> {
        let mut url = self.provider_url(AUTHORIZE_PATH)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("response_type", "id_token token")
            .append_pair("redirect_uri", self.settings.redirect_uri.as_str())
            .append_pair("response_mode", "fragment")
            .append_pair("scope", &self.settings.scopes.join(" "))
            .append_pair("prompt", "select_account");
        Ok(url)
    }

    fn is_our_callback(&self, url: &Url) -> bool {
        let expected = &self.settings.redirect_uri;
        url.scheme() == expected.scheme()
            && url.host_str() == expected.host_str()
            && url.port_or_known_default() == expected.port_or_known_default()
            && url.path() == expected.path()
    }

    fn credential_from_callback(url: &Url) -> Result<Credential, AuthError> {
        let params = callback_params(url);

        if let Some(error) = params.get("error") {
            let reason = params
                .get("error_description")
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(error);
            return Err(AuthError::AuthenticationFailed(reason.clone()));
        }

        let token = params
            .get("access_token")
            .or_else(|| params.get("id_token"))
            .ok_or_else(|| {
                AuthError::AuthenticationFailed(
                    "Sign-in callback carried neither a token nor an error".to_string(),
                )
            })?;

        // The ID token names the account; the access token is a fallback
        let subject = ["id_token", "access_token"]
            .iter()
            .filter_map(|key| params.get(*key))
            .filter_map(|t| TokenClaims::decode(t).ok())
            .find_map(|claims| claims.subject_name().map(str::to_string))
            .unwrap_or_default();

        let mut credential = Credential::new(token.clone(), subject, Provider::ExternalRedirect)?;
        if let Some(seconds) = params.get("expires_in").and_then(|s| s.trim().parse::<i64>().ok()) {
            let now = Utc::now();
            let expires_at = Duration::try_seconds(seconds)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .unwrap_or_else(|| {
                    warn!(expires_in = seconds, "Out-of-range token lifetime, treating as expired");
                    now
                });
            credential = credential.with_expires_at(expires_at);
        }
        Ok(credential)
    }
}

/// Fragment parameters, or the query string when the fragment has none
fn callback_params(url: &Url) -> HashMap<String, String> {
    let from_fragment: HashMap<String, String> = url
        .fragment()
        .map(|f| url::form_urlencoded::parse(f.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    if from_fragment.is_empty() {
        url.query_pairs().into_owned().collect()
    } else {
        from_fragment
    }
}

#[async_trait]
impl IdentityProvider for ExternalRedirectProvider {
    fn kind(&self) -> Provider {
        Provider::ExternalRedirect
    }

    async fn complete_handshake(&self) -> Result<Option<Credential>, AuthError> {
        let pending = self
            .pending_callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(url) = pending else {
            return Ok(None);
        };

        if !self.is_our_callback(&url) {
            warn!(path = url.path(), "Ignoring URL that is not the sign-in callback");
            return Ok(None);
        }

        debug!("Completing redirect sign-in");
        let credential = Self::credential_from_callback(&url)?;
        info!(subject = credential.subject_name(), "Redirect sign-in completed");
        Ok(Some(credential))
    }

    async fn sign_in(&self, options: &SignInOptions) -> Result<ProviderSignIn, AuthError> {
        match options {
            SignInOptions::Redirect => self.authorize_url().map(ProviderSignIn::RedirectTo),
            SignInOptions::Password(_) => Err(AuthError::Unsupported("password sign-in")),
        }
    }

    fn end_session_url(&self) -> Option<Url> {
        let mut url = match self.provider_url(LOGOUT_PATH) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Cannot end the provider session");
                return None;
            }
        };
        if let Some(uri) = &self.settings.post_logout_redirect_uri {
            url.query_pairs_mut()
                .append_pair("post_logout_redirect_uri", uri.as_str());
        }
        Some(url)
    }
}

// ============================================================================
// Tests
// ============================================================================
