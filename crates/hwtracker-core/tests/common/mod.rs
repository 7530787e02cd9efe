#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde_json::json;

use hwtracker_core::auth::{
    CredentialStore, IdentityProvider, MemoryCredentialStore, Navigator, Notifier, Route,
    SessionManager, TOKEN_KEY, USERNAME_KEY,
};

/// Unsigned JWT for `sub` expiring `delta` from now
pub fn jwt(sub: &str, delta: Duration) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({ "sub": sub, "iat": Utc::now().timestamp(), "exp": (Utc::now() + delta).timestamp() })
            .to_string(),
    );
    format!("{}.{}.sig", header, payload)
}

#[derive(Default)]
pub struct Recorder {
    pub routes: Mutex<Vec<Route>>,
    pub messages: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for Recorder {
    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}

impl Notifier for Recorder {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub struct Fixture {
    pub session: Arc<SessionManager>,
    pub store: Arc<MemoryCredentialStore>,
    pub recorder: Arc<Recorder>,
}

pub fn fixture(provider: Arc<dyn IdentityProvider>) -> Fixture {
    let store = Arc::new(MemoryCredentialStore::new());
    let recorder = Arc::new(Recorder::default());
    let session = Arc::new(SessionManager::new(
        store.clone(),
        provider,
        recorder.clone(),
        recorder.clone(),
    ));
    Fixture {
        session,
        store,
        recorder,
    }
}

/// Fixture whose store already holds a session for `username`
pub async fn signed_in_fixture(provider: Arc<dyn IdentityProvider>, token: &str, username: &str) -> Fixture {
    let f = fixture(provider);
    f.store.set(TOKEN_KEY, token).unwrap();
    f.store.set(USERNAME_KEY, username).unwrap();
    f.session.initialize().await;
    f
}
