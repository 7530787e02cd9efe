use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;
use crate::utils::truncate_body;

/// Failures talking to the homework backend
#[derive(Error, Debug)]
pub enum ApiError {
    /// 401: the backend no longer accepts the session token
    #[error("The server did not accept your session")]
    Unauthorized,

    #[error("Homework item not found: {0}")]
    NotFound(String),

    /// Other 4xx; the body names the problem (e.g. a missing `childId`)
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Too many requests - try again shortly")]
    RateLimited,

    #[error("Homework service error: {0}")]
    ServerError(String),

    #[error("Could not reach the homework service: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    /// Map a non-2xx response
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = truncate_body(body.trim());
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
            s if s.is_server_error() => ApiError::ServerError(message),
            status => ApiError::Rejected { status, message },
        }
    }

    /// Whether signing in again could fix this
    pub fn needs_sign_in(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized | ApiError::Auth(AuthError::NotAuthenticated)
        )
    }
}
