use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Only produced while decoding a token; callers fold it into "expired".
    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    #[error("Not authenticated - please sign in")]
    NotAuthenticated,

    #[error("Not supported by this identity provider: {0}")]
    Unsupported(&'static str),
}

impl AuthError {
    /// Message suitable for showing to the user next to a retry affordance
    pub fn user_message(&self) -> String {
        match self {
            AuthError::AuthenticationFailed(reason) => reason.clone(),
            AuthError::NetworkUnavailable(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            AuthError::TokenMalformed(_) => "Your session has expired. Please log in again.".to_string(),
            AuthError::NotAuthenticated => "Please sign in to continue.".to_string(),
            AuthError::Unsupported(what) => format!("{} is not available", what),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::NetworkUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_passes_provider_reason_through() {
        let err = AuthError::AuthenticationFailed("Invalid credentials".to_string());
        assert_eq!(err.user_message(), "Invalid credentials");
    }

    #[test]
    fn test_user_message_hides_network_detail() {
        let err = AuthError::NetworkUnavailable("dns error: no such host".to_string());
        assert!(!err.user_message().contains("dns"));
    }
}
