//! Side effects the session manager asks its host to perform.
//!
//! The manager never renders anything itself. Front ends implement these
//! traits to move between views and to show blocking messages.

use url::Url;

/// Where the host should take the user next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Public landing view
    Landing,
    /// Sign-in view
    SignIn,
    /// Protected area (the homework dashboard)
    Protected,
    /// Leave the application for an external identity provider
    External(Url),
    /// Leave the application so the identity provider can end its session;
    /// the provider returns the user to the landing view
    EndSession(Url),
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

pub trait Notifier: Send + Sync {
    /// Show a message to the user. Returns once the message has been shown.
    fn notify(&self, message: &str);
}
