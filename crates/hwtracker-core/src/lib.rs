//! hwtracker core library.
//!
//! Session management, identity providers and the homework REST client
//! shared by the hwtracker front ends.
//!
//! The [`auth::SessionManager`] is the single authority for whether the
//! current user is signed in. Front ends construct one per process, call
//! [`auth::SessionManager::initialize`] on startup and gate every protected
//! view with [`auth::SessionManager::require_authenticated`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiError, HomeworkClient};
pub use auth::{
    AuthError, Credential, CredentialStore, IdentityProvider, InitOutcome, Navigator, Notifier,
    Provider, Route, SessionManager, SessionState, SignInOptions, SignInOutcome,
};
pub use config::Config;
