use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use super::provider::ProviderSignIn;
use super::store::{EXPIRES_AT_KEY, TOKEN_KEY, USERNAME_KEY};
use super::watch::ExpiryWatch;
use super::{
    AuthError, Credential, CredentialStore, IdentityProvider, LoginRequest, Navigator, Notifier,
    Provider, Route, SessionState, SignInOptions, SignInOutcome,
};

/// Shown before a forced sign-out
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Result of [`SessionManager::initialize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// A pending redirect sign-in completed; the host was sent to the protected area
    HandshakeCompleted(Credential),
    /// A previously persisted credential was loaded (it may since have expired)
    Restored(Credential),
    Unauthenticated,
    /// The provider failed to complete a pending sign-in. Nothing was loaded.
    HandshakeFailed(AuthError),
}

/// Result of one periodic expiry check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    Valid,
    /// The user was notified, the session cleared and the host sent to sign-in
    Expired,
    /// Nothing to check; the session already ended some other way
    NoSession,
}

/// Single authority for "is the current user signed in, and as whom".
///
/// One instance per process, shared by `Arc`. It owns a transient copy of
/// the credential; the [`CredentialStore`] owns the durable one. Sign-in,
/// sign-out and forced expiry are serialized so a racing sign-out and
/// expiry check produce a single navigation.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    cached: Mutex<Option<Credential>>,
    transition: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            provider,
            navigator,
            notifier,
            cached: Mutex::new(None),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    pub fn provider_kind(&self) -> Provider {
        self.provider.kind()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Finish any pending external sign-in, otherwise load the persisted
    /// credential. Provider failures are logged and reported, never raised.
    pub async fn initialize(&self) -> InitOutcome {
        match self.provider.complete_handshake().await {
            Ok(Some(credential)) => {
                let _guard = self.transition.lock().await;
                self.establish(&credential);
                self.navigator.navigate(Route::Protected);
                InitOutcome::HandshakeCompleted(credential)
            }
            Ok(None) => match self.load_stored() {
                Some(credential) => {
                    debug!(expired = credential.is_expired(), "Session restored");
                    self.set_cached(Some(credential.clone()));
                    InitOutcome::Restored(credential)
                }
                None => {
                    debug!("No session data found");
                    InitOutcome::Unauthenticated
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to complete sign-in handshake");
                InitOutcome::HandshakeFailed(e)
            }
        }
    }

    /// Start authentication.
    ///
    /// Redirect providers hand control to the provider and report
    /// [`SignInOutcome::Redirected`]; the flow resumes in `initialize` on the
    /// next start. Bearer providers return the persisted credential. On
    /// failure nothing is persisted.
    pub async fn sign_in(&self, options: &SignInOptions) -> Result<SignInOutcome, AuthError> {
        match self.provider.sign_in(options).await {
            Ok(ProviderSignIn::Issued(credential)) => {
                let _guard = self.transition.lock().await;
                self.establish(&credential);
                Ok(SignInOutcome::Authenticated(credential))
            }
            Ok(ProviderSignIn::RedirectTo(url)) => {
                info!(host = url.host_str().unwrap_or_default(), "Redirecting to identity provider");
                self.navigator.navigate(Route::External(url));
                Ok(SignInOutcome::Redirected)
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                Err(e)
            }
        }
    }

    /// Create an account and sign in with it (bearer providers only)
    pub async fn register(&self, request: &LoginRequest) -> Result<Credential, AuthError> {
        match self.provider.register(request).await {
            Ok(credential) => {
                let _guard = self.transition.lock().await;
                self.establish(&credential);
                Ok(credential)
            }
            Err(e) => {
                warn!(error = %e, "Registration failed");
                Err(e)
            }
        }
    }

    /// Clear the persisted and cached credential and go to the landing view,
    /// by way of the provider's end-session page when it keeps a session of
    /// its own.
    ///
    /// Idempotent: with no session there is nothing to clear and no
    /// navigation. Returns whether a session was ended.
    pub async fn sign_out(&self) -> bool {
        let _guard = self.transition.lock().await;
        let had_session = self.current().is_some();
        self.clear();

        if had_session {
            info!("Signed out");
            let route = match self.provider.end_session_url() {
                Some(url) => Route::EndSession(url),
                None => Route::Landing,
            };
            self.navigator.navigate(route);
        } else {
            debug!("Sign-out with no active session");
        }
        had_session
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Cached credential, else the persisted one. Does not populate the cache.
    pub fn current(&self) -> Option<Credential> {
        self.cached().or_else(|| self.load_stored())
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_credential(self.current(), Utc::now())
    }

    /// A credential exists and its expiry, if readable, has not passed.
    /// Never mutates anything.
    pub fn is_authenticated(&self) -> bool {
        self.current().is_some_and(|c| !c.has_lapsed())
    }

    /// Fail-closed expiry of the current credential: an unreadable expiry or
    /// no credential at all counts as expired
    pub fn is_expired(&self) -> bool {
        self.current().map(|c| c.is_expired()).unwrap_or(true)
    }

    /// `Authorization: Bearer <token>` for the cached credential
    pub fn authorization_header(&self) -> Result<HeaderMap, AuthError> {
        let credential = self.cached().ok_or(AuthError::NotAuthenticated)?;

        let mut value = HeaderValue::from_str(&format!("Bearer {}", credential.token()))
            .map_err(|_| {
                warn!("Token cannot be sent as a header value");
                AuthError::NotAuthenticated
            })?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    // =========================================================================
    // View gates
    // =========================================================================

    /// Gate for protected views. `false` means the host has been sent to the
    /// sign-in view and the caller must stop initializing.
    pub fn require_authenticated(&self) -> bool {
        if self.is_authenticated() {
            true
        } else {
            self.navigator.navigate(Route::SignIn);
            false
        }
    }

    /// Gate for public views: skip the sign-in form for a signed-in user
    pub fn redirect_if_authenticated(&self) -> bool {
        if self.is_authenticated() {
            self.navigator.navigate(Route::Protected);
            true
        } else {
            false
        }
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// One periodic check: on expiry, notify, clear and send the host to
    /// sign-in, in that order.
    pub async fn check_expiry(&self) -> ExpiryCheck {
        let _guard = self.transition.lock().await;

        let Some(credential) = self.current() else {
            return ExpiryCheck::NoSession;
        };
        if !credential.is_expired() {
            return ExpiryCheck::Valid;
        }

        info!(subject = credential.subject_name(), "Session expired");
        self.notifier.notify(SESSION_EXPIRED_MESSAGE);
        self.clear();
        self.navigator.navigate(Route::SignIn);
        ExpiryCheck::Expired
    }

    /// Run [`check_expiry`](Self::check_expiry) now and every `period` until
    /// the session ends or the returned handle is dropped
    pub fn spawn_expiry_watch(self: &Arc<Self>, period: Duration) -> ExpiryWatch {
        ExpiryWatch::spawn(Arc::clone(self), period)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn cached(&self) -> Option<Credential> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_cached(&self, credential: Option<Credential>) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = credential;
    }

    /// Persist and cache. Store failures are logged; the cache stays
    /// authoritative for the rest of the process.
    fn establish(&self, credential: &Credential) {
        if let Err(e) = self.store.set(TOKEN_KEY, credential.token()) {
            warn!(error = %e, "Failed to persist token");
        }
        if let Err(e) = self.store.set(USERNAME_KEY, credential.subject_name()) {
            warn!(error = %e, "Failed to persist username");
        }
        // Replace or drop, so a previous session's expiry never carries over
        let persisted = match credential.expires_at() {
            Some(exp) => self.store.set(EXPIRES_AT_KEY, &exp.to_rfc3339()),
            None => self.store.delete(EXPIRES_AT_KEY),
        };
        if let Err(e) = persisted {
            warn!(error = %e, "Failed to persist session expiry");
        }
        self.set_cached(Some(credential.clone()));
        info!(subject = credential.subject_name(), provider = ?credential.provider(), "Signed in");
    }

    fn clear(&self) {
        self.set_cached(None);
        for key in [TOKEN_KEY, USERNAME_KEY, EXPIRES_AT_KEY] {
            if let Err(e) = self.store.delete(key) {
                warn!(error = %e, key, "Failed to delete stored credential");
            }
        }
    }

    /// Credential from the store; absence of either key means no session
    fn load_stored(&self) -> Option<Credential> {
        let read = |key: &str| match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, key, "Failed to read credential store");
                None
            }
        };

        let token = read(TOKEN_KEY)?;
        let username = read(USERNAME_KEY)?;
        let credential = match Credential::new(token, username, self.provider.kind()) {
            Ok(credential) => credential,
            Err(e) => {
                debug!(error = %e, "Ignoring incomplete stored credential");
                return None;
            }
        };

        let expires_at = read(EXPIRES_AT_KEY).and_then(|value| {
            match DateTime::parse_from_rfc3339(&value) {
                Ok(exp) => Some(exp.with_timezone(&Utc)),
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable stored expiry");
                    None
                }
            }
        });
        Some(match expires_at {
            Some(exp) => credential.with_expires_at(exp),
            None => credential,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
