//! API client for the homework backend.
//!
//! This module provides the `HomeworkClient` struct for making authenticated
//! requests against `/homework`.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::ApiError;
use crate::auth::SessionManager;
use crate::config::Config;
use crate::models::{sort_by_due_date, Homework, NewHomework};

// ============================================================================
// Constants
// ============================================================================

/// Initial backoff delay for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Homework API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HomeworkClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HomeworkClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self::with_client(client, &config.api_base_url, config.retry_attempts))
    }

    /// Share an existing connection pool
    pub fn with_client(client: Client, base_url: &str, max_retries: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            initial_backoff: INITIAL_BACKOFF,
        }
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    // ===== Homework =====

    /// All homework items, earliest due date first
    pub async fn list(&self, session: &SessionManager) -> Result<Vec<Homework>> {
        let url = self.endpoint(&["homework"])?;
        let mut items: Vec<Homework> = self.send(session, Method::GET, url, None::<&()>).await?;
        sort_by_due_date(&mut items);
        debug!(count = items.len(), "Fetched homework");
        Ok(items)
    }

    pub async fn add(&self, session: &SessionManager, homework: &NewHomework) -> Result<Homework> {
        let url = self.endpoint(&["homework"])?;
        self.send(session, Method::POST, url, Some(homework)).await
    }

    /// Mark an item complete. The backend partitions items by child, so the
    /// child id is required.
    pub async fn complete(&self, session: &SessionManager, id: &str, child_id: &str) -> Result<Homework> {
        let url = self.endpoint(&["homework", id, "complete"])?;
        let body = serde_json::json!({
            "completed": true,
            "childId": child_id,
        });
        self.send(session, Method::PATCH, url, Some(&body)).await
    }

    /// `base_url` plus `segments`, each percent-encoded as a single segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid API base URL {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("API base URL cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ===== Transport =====

    /// Send an authorized request, retrying 429 responses with exponential
    /// backoff
    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        session: &SessionManager,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T> {
        // Fails before any I/O when nobody is signed in
        let headers = session.authorization_header().map_err(ApiError::from)?;

        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let mut request: RequestBuilder = self
                .client
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send {} request to {}", method, url))?;

            let status = response.status();
            if status.is_success() {
                return response
                    .json()
                    .await
                    .with_context(|| format!("Failed to parse JSON response from {}", url));
            }

            if status.as_u16() == 429 {
                retries += 1;
                if retries > self.max_retries {
                    return Err(ApiError::RateLimited.into());
                }
                warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2; // Exponential backoff
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 401 {
                warn!(url = %url, "Backend rejected the session token");
            }
            return Err(ApiError::from_status(status, &body).into());
        }
    }
}
