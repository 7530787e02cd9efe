//! Backend login/register endpoints that answer with a JWT.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::provider::ProviderSignIn;
use super::{AuthError, Credential, IdentityProvider, LoginRequest, Provider, SignInOptions};
use crate::utils::truncate_body;

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    #[serde(default)]
    username: String,
}

/// Identity provider backed by `POST /auth/login` and `POST /auth/register`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct BearerTokenProvider {
    client: Client,
    base_url: String,
}

impl BearerTokenProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Share an existing connection pool
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_credentials(
        &self,
        path: &str,
        request: &LoginRequest,
        failure: &str,
    ) -> Result<Credential, AuthError> {
        if request.username.trim().is_empty() || request.password.is_empty() {
            return Err(AuthError::AuthenticationFailed(
                "Username and password required".to_string(),
            ));
        }

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, username = %request.username, "Sending credentials");

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.trim();
            warn!(status = %status, username = %request.username, "Identity provider rejected credentials");
            let reason = if body.is_empty() {
                failure.to_string()
            } else {
                truncate_body(body)
            };
            return Err(AuthError::AuthenticationFailed(reason));
        }

        let auth: AuthResponse = response.json().await.map_err(|e| {
            AuthError::AuthenticationFailed(format!("Invalid response from identity provider: {}", e))
        })?;

        let username = if auth.username.trim().is_empty() {
            request.username.clone()
        } else {
            auth.username
        };

        info!(username = %username, "Credential issued");
        Credential::new(auth.token, username, Provider::BearerToken)
    }
}

#[async_trait]
impl IdentityProvider for BearerTokenProvider {
    fn kind(&self) -> Provider {
        Provider::BearerToken
    }

    async fn complete_handshake(&self) -> Result<Option<Credential>, AuthError> {
        Ok(None)
    }

    async fn sign_in(&self, options: &SignInOptions) -> Result<ProviderSignIn, AuthError> {
        match options {
            SignInOptions::Password(request) => self
                .post_credentials(LOGIN_PATH, request, "Login failed")
                .await
                .map(ProviderSignIn::Issued),
            SignInOptions::Redirect => Err(AuthError::Unsupported("redirect sign-in")),
        }
    }

    async fn register(&self, request: &LoginRequest) -> Result<Credential, AuthError> {
        self.post_credentials(REGISTER_PATH, request, "Registration failed")
            .await
    }
}
