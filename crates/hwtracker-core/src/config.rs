//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, which identity provider to use, where the session is
//! kept, and request/expiry-check tuning.
//!
//! Configuration is stored at `~/.config/hwtracker/config.json`; any field
//! can be overridden with an `HWTRACKER_*` environment variable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::auth::{
    BearerTokenProvider, CredentialStore, ExternalRedirectProvider, FileCredentialStore,
    KeyringCredentialStore, RedirectSettings,
};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "hwtracker";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:7071/api";
const DEFAULT_CHILD_ID: &str = "alex";

/// Which identity provider this deployment signs in with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// `POST /auth/login` and `/auth/register` on the API base URL
    Bearer,
    /// Redirect-based OAuth/OIDC service
    External {
        authority: String,
        client_id: String,
        #[serde(default = "default_scopes")]
        scopes: Vec<String>,
        redirect_uri: String,
        /// Landing page the provider returns to after signing out
        #[serde(default, skip_serializing_if = "Option::is_none")]
        post_logout_redirect_uri: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackend {
    /// `session.json` in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub provider: ProviderConfig,
    pub credential_backend: CredentialBackend,
    pub request_timeout_secs: u64,
    pub retry_attempts: u32,
    pub expiry_check_interval_secs: u64,
    pub default_child_id: String,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            provider: ProviderConfig::Bearer,
            credential_backend: CredentialBackend::File,
            request_timeout_secs: 10,
            retry_attempts: 3,
            expiry_check_interval_secs: 60,
            default_child_id: DEFAULT_CHILD_ID.to_string(),
            last_username: None,
        }
    }
}

fn default_scopes() -> Vec<String> {
    ["openid", "profile", "email"].iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Load from disk (defaults when absent), then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `HWTRACKER_*` overrides from `lookup`. Unparsable numbers are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("HWTRACKER_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(backend) = lookup("HWTRACKER_CREDENTIAL_BACKEND") {
            match backend.to_ascii_lowercase().as_str() {
                "file" => self.credential_backend = CredentialBackend::File,
                "keyring" => self.credential_backend = CredentialBackend::Keyring,
                other => debug!(value = other, "Ignoring unknown credential backend"),
            }
        }
        if let Some(secs) = lookup("HWTRACKER_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = secs;
        }
        if let Some(n) = lookup("HWTRACKER_RETRY_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.retry_attempts = n;
        }
        if let Some(secs) = lookup("HWTRACKER_EXPIRY_CHECK_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.expiry_check_interval_secs = secs;
        }
        if let Some(child) = lookup("HWTRACKER_CHILD_ID") {
            self.default_child_id = child;
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_check_interval_secs)
    }

    // ===== Collaborators =====

    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        Ok(match self.credential_backend {
            CredentialBackend::File => Arc::new(FileCredentialStore::new(self.cache_dir()?)),
            CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new()),
        })
    }

    pub fn bearer_provider(&self) -> Result<BearerTokenProvider> {
        BearerTokenProvider::new(&self.api_base_url, self.request_timeout())
    }

    /// `None` when the deployment signs in with bearer tokens
    pub fn redirect_provider(&self) -> Result<Option<ExternalRedirectProvider>> {
        match &self.provider {
            ProviderConfig::Bearer => Ok(None),
            ProviderConfig::External {
                authority,
                client_id,
                scopes,
                redirect_uri,
                post_logout_redirect_uri,
            } => {
                let settings = RedirectSettings {
                    authority: Url::parse(authority).context("Invalid provider authority URL")?,
                    client_id: client_id.clone(),
                    scopes: scopes.clone(),
                    redirect_uri: Url::parse(redirect_uri).context("Invalid redirect URI")?,
                    post_logout_redirect_uri: post_logout_redirect_uri
                        .as_deref()
                        .map(Url::parse)
                        .transpose()
                        .context("Invalid post-logout redirect URI")?,
                };
                Ok(Some(ExternalRedirectProvider::new(settings)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::IdentityProvider;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.provider, ProviderConfig::Bearer);
        assert_eq!(config.credential_backend, CredentialBackend::File);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.expiry_check_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_partial_file() {
        let json = r#"{"api_base_url": "https://hw.example.com/api", "last_username": "alice"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_base_url, "https://hw.example.com/api");
        assert_eq!(config.last_username.as_deref(), Some("alice"));
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn test_parse_external_provider() {
        let json = r#"{
            "provider": {
                "kind": "external",
                "authority": "https://tenant.b2clogin.com/tenant.onmicrosoft.com/B2C_1_signupsignin",
                "client_id": "client-123",
                "redirect_uri": "http://localhost:8080/dashboard.html",
                "post_logout_redirect_uri": "http://localhost:8080/index.html"
            },
            "credential_backend": "keyring"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        match &config.provider {
            ProviderConfig::External { scopes, client_id, .. } => {
                assert_eq!(client_id, "client-123");
                assert_eq!(scopes, &default_scopes());
            }
            other => panic!("unexpected provider {:?}", other),
        }
        let provider = config.redirect_provider().unwrap().unwrap();
        let end_session = provider.end_session_url().unwrap();
        assert!(end_session.as_str().contains("post_logout_redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Findex.html"));
    }

    #[test]
    fn test_invalid_redirect_uri_is_an_error() {
        let config = Config {
            provider: ProviderConfig::External {
                authority: "https://idp.example.com".to_string(),
                client_id: "c".to_string(),
                scopes: default_scopes(),
                redirect_uri: "not a url".to_string(),
                post_logout_redirect_uri: None,
            },
            ..Config::default()
        };
        assert!(config.redirect_provider().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HWTRACKER_API_BASE_URL", "https://prod.example.com/api"),
            ("HWTRACKER_CREDENTIAL_BACKEND", "Keyring"),
            ("HWTRACKER_RETRY_ATTEMPTS", "5"),
            ("HWTRACKER_EXPIRY_CHECK_INTERVAL_SECS", "not-a-number"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_base_url, "https://prod.example.com/api");
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.expiry_check_interval_secs, 60);
    }
}
