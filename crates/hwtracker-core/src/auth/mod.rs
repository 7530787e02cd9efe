//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionManager`: acquires, validates, persists and expires the credential
//! - `CredentialStore`: durable key-value storage (file, OS keychain, memory)
//! - `IdentityProvider`: bearer-token backend or external redirect service
//! - `Navigator` / `Notifier`: the side effects the manager asks the host for
//!
//! Tokens are JWTs; expiry is read from the `exp` claim and any token that
//! cannot be decoded is treated as expired.

pub mod bearer;
pub mod credential;
pub mod effects;
pub mod error;
pub mod provider;
pub mod redirect;
pub mod session;
pub mod store;
pub mod token;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

pub use bearer::BearerTokenProvider;
pub use credential::{Credential, Provider, SessionState};
pub use effects::{Navigator, Notifier, Route};
pub use error::AuthError;
pub use provider::{IdentityProvider, LoginRequest, ProviderSignIn, SignInOptions, SignInOutcome};
pub use redirect::{ExternalRedirectProvider, RedirectSettings};
pub use session::{ExpiryCheck, InitOutcome, SessionManager, SESSION_EXPIRED_MESSAGE};
pub use store::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    EXPIRES_AT_KEY, TOKEN_KEY, USERNAME_KEY,
};
pub use watch::ExpiryWatch;
