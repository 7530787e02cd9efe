//! Fakes shared by the auth unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use url::Url;

use super::provider::ProviderSignIn;
use super::{
    AuthError, Credential, CredentialStore, IdentityProvider, LoginRequest, MemoryCredentialStore,
    Navigator, Notifier, Provider, Route, SignInOptions,
};

/// Unsigned JWT carrying `claims`
pub fn make_token(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

pub fn token_expiring_in(delta: Duration) -> String {
    let now = Utc::now();
    make_token(json!({
        "sub": "alice",
        "iat": now.timestamp(),
        "exp": (now + delta).timestamp(),
    }))
}

/// Everything observable the session manager did, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notified(String),
    Navigated(Route),
    StoreSet(String),
    StoreDeleted(String),
}

#[derive(Clone, Default)]
pub struct EffectLog(Arc<Mutex<Vec<Effect>>>);

impl EffectLog {
    pub fn push(&self, effect: Effect) {
        self.0.lock().unwrap().push(effect);
    }

    pub fn all(&self) -> Vec<Effect> {
        self.0.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<Route> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Navigated(route) => Some(route),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> usize {
        self.all()
            .iter()
            .filter(|e| matches!(e, Effect::Notified(_)))
            .count()
    }

    pub fn store_writes(&self) -> usize {
        self.all()
            .iter()
            .filter(|e| matches!(e, Effect::StoreSet(_) | Effect::StoreDeleted(_)))
            .count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl Navigator for EffectLog {
    fn navigate(&self, route: Route) {
        self.push(Effect::Navigated(route));
    }
}

impl Notifier for EffectLog {
    fn notify(&self, message: &str) {
        self.push(Effect::Notified(message.to_string()));
    }
}

/// Memory store that records writes into an [`EffectLog`]
pub struct RecordingStore {
    inner: MemoryCredentialStore,
    log: EffectLog,
}

impl RecordingStore {
    pub fn new(log: EffectLog) -> Self {
        Self {
            inner: MemoryCredentialStore::new(),
            log,
        }
    }
}

impl CredentialStore for RecordingStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.log.push(Effect::StoreSet(key.to_string()));
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.log.push(Effect::StoreDeleted(key.to_string()));
        self.inner.delete(key)
    }
}

/// Provider with a fixed account table and an optional pending handshake
pub struct FakeProvider {
    kind: Provider,
    accounts: HashMap<String, String>,
    token: String,
    handshake: Mutex<Option<Result<Credential, AuthError>>>,
}

impl FakeProvider {
    pub fn bearer() -> Self {
        Self {
            kind: Provider::BearerToken,
            accounts: HashMap::from([("alice".to_string(), "correct-pw".to_string())]),
            token: token_expiring_in(Duration::hours(24)),
            handshake: Mutex::new(None),
        }
    }

    pub fn redirect() -> Self {
        Self {
            kind: Provider::ExternalRedirect,
            ..Self::bearer()
        }
    }

    pub fn issuing(mut self, token: String) -> Self {
        self.token = token;
        self
    }

    pub fn with_handshake(self, result: Result<Credential, AuthError>) -> Self {
        *self.handshake.lock().unwrap() = Some(result);
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn kind(&self) -> Provider {
        self.kind
    }

    async fn complete_handshake(&self) -> Result<Option<Credential>, AuthError> {
        self.handshake.lock().unwrap().take().transpose()
    }

    async fn sign_in(&self, options: &SignInOptions) -> Result<ProviderSignIn, AuthError> {
        match (self.kind, options) {
            (Provider::BearerToken, SignInOptions::Password(request)) => {
                match self.accounts.get(&request.username) {
                    Some(password) if *password == request.password => Credential::new(
                        self.token.clone(),
                        request.username.clone(),
                        Provider::BearerToken,
                    )
                    .map(ProviderSignIn::Issued),
                    _ => Err(AuthError::AuthenticationFailed("Invalid credentials".to_string())),
                }
            }
            (Provider::ExternalRedirect, SignInOptions::Redirect) => Ok(ProviderSignIn::RedirectTo(
                Url::parse("https://idp.example.com/authorize?client_id=c").unwrap(),
            )),
            _ => Err(AuthError::Unsupported("sign-in mode")),
        }
    }

    async fn register(&self, request: &LoginRequest) -> Result<Credential, AuthError> {
        if self.kind != Provider::BearerToken {
            return Err(AuthError::Unsupported("account registration"));
        }
        if self.accounts.contains_key(&request.username) {
            return Err(AuthError::AuthenticationFailed("Username already exists".to_string()));
        }
        Credential::new(self.token.clone(), request.username.clone(), Provider::BearerToken)
    }

    fn end_session_url(&self) -> Option<Url> {
        (self.kind == Provider::ExternalRedirect)
            .then(|| Url::parse("https://idp.example.com/logout").unwrap())
    }
}
