// GitHub API HTTP client.
// Issues single-attempt GET requests, tracks rate limits, and hands back the raw status and body.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{BlocksError, Result};

use super::types::{ApiErrorBody, RateLimit};

const GITHUB_API_VERSION: &str = "2022-11-28";

/// Status and body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `message` GitHub put in an error body, or a generic one for the status.
    pub fn error_message(&self) -> String {
        serde_json::from_slice::<ApiErrorBody>(&self.body)
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| {
                let reason = StatusCode::from_u16(self.status)
                    .ok()
                    .and_then(|status| status.canonical_reason())
                    .unwrap_or("Unexpected status");
                format!("GitHub returned HTTP {} {}", self.status, reason)
            })
    }
}

/// The request could not complete: DNS, connection, or timeout failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let timed_out = err.is_timeout();
        let message = if timed_out {
            format!("request to GitHub timed out: {err}")
        } else {
            format!("request to GitHub failed: {err}")
        };
        Self { message, timed_out }
    }
}

/// Source of raw GitHub responses.
///
/// Implementations make exactly one attempt per call and never retry.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<RawResponse, TransportError>;
}

/// GitHub API client with optional token authentication and rate limit tracking.
pub struct GitHubClient {
    client: Client,
    api_base: String,
    authenticated: bool,
    rate_limit: Mutex<RateLimit>,
}

impl GitHubClient {
    /// Create a client from the token, base URL and timeout in `config`.
    ///
    /// Without a token no `Authorization` header is sent at all.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(token) = config.token() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("token {}", token))
                    .map_err(|e| BlocksError::InvalidToken(e.to_string()))?,
            );
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("blocks-for-github"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(BlocksError::Api)?;

        Ok(Self {
            client,
            api_base: config.api_base().to_string(),
            authenticated: config.token().is_some(),
            rate_limit: Mutex::new(RateLimit::default()),
        })
    }

    /// Base URL every endpoint is resolved against.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Rate limit as reported by the most recent response.
    pub fn rate_limit(&self) -> RateLimit {
        *self.lock_rate_limit()
    }

    fn lock_rate_limit(&self) -> MutexGuard<'_, RateLimit> {
        self.rate_limit
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Update rate limit from response headers.
    fn update_rate_limit(&self, response: &Response) {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        };

        let mut rate_limit = self.lock_rate_limit();
        if let Some(limit) = header("x-ratelimit-limit") {
            rate_limit.limit = limit;
        }
        if let Some(reset) = header("x-ratelimit-reset") {
            rate_limit.reset = reset;
        }
        if let Some(remaining) = header("x-ratelimit-remaining") {
            rate_limit.remaining = remaining;
            if remaining == 0 {
                warn!(
                    authenticated = self.authenticated,
                    reset_at = %rate_limit.reset_at(),
                    "GitHub rate limit exhausted"
                );
            }
        }
    }
}

#[async_trait]
impl Upstream for GitHubClient {
    async fn get(&self, url: &str) -> std::result::Result<RawResponse, TransportError> {
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;

        self.update_rate_limit(&response);
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        debug!(%url, status, bytes = body.len(), "GitHub responded");
        Ok(RawResponse::new(status, body.to_vec()))
    }
}
