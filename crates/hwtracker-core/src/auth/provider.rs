use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use super::{AuthError, Credential, Provider};

/// Username/password pair sent to a bearer-token backend
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum SignInOptions {
    /// Bearer-token backends
    Password(LoginRequest),
    /// Redirect providers; scopes and return address come from configuration
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// Credential issued in place
    Authenticated(Credential),
    /// Control has been handed to an external provider; the flow resumes
    /// through `SessionManager::initialize` on the next start
    Redirected,
}

/// What a provider answers to a sign-in request, before the session manager
/// applies it
#[derive(Debug)]
pub enum ProviderSignIn {
    Issued(Credential),
    RedirectTo(Url),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn kind(&self) -> Provider;

    /// Finish a sign-in that left the application, if one is pending.
    /// `Ok(None)` when there is nothing to complete.
    async fn complete_handshake(&self) -> Result<Option<Credential>, AuthError>;

    async fn sign_in(&self, options: &SignInOptions) -> Result<ProviderSignIn, AuthError>;

    async fn register(&self, _request: &LoginRequest) -> Result<Credential, AuthError> {
        Err(AuthError::Unsupported("account registration"))
    }

    /// Where to send the user so the provider ends its own session too.
    /// `None` when signing out locally is enough.
    fn end_session_url(&self) -> Option<Url> {
        None
    }
}
