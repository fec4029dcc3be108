// Fetch orchestration.
// Resolves a descriptor through the cache or GitHub; every outcome is a FetchResult value.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStore};
use crate::config::Config;
use crate::descriptor::{ResourceDescriptor, ResourceKind};
use crate::error::Result;
use crate::github::{
    GitHubClient, RawResponse, Repository, SearchResults, Upstream, UserProfile, endpoint_url,
};

/// Why a fetch produced no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum FailureKind {
    /// No response was obtained (DNS, connection, timeout).
    Transport,
    /// GitHub rejected the request (4xx).
    Client(u16),
    /// GitHub failed or answered unexpectedly (5xx, unfollowed 3xx).
    Server(u16),
    /// A success response whose body was not the data expected for its kind.
    Decode,
}

impl FailureKind {
    /// HTTP status behind the failure, when there was a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FailureKind::Client(status) | FailureKind::Server(status) => Some(*status),
            FailureKind::Transport | FailureKind::Decode => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => f.write_str("transport error"),
            FailureKind::Client(status) => write!(f, "client error ({status})"),
            FailureKind::Server(status) => write!(f, "server error ({status})"),
            FailureKind::Decode => f.write_str("decode error"),
        }
    }
}

/// Outcome of one fetch. Only `Success` payloads are ever cached.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Success(Value),
    Failure { kind: FailureKind, message: String },
}

impl FetchResult {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        FetchResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success(_))
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            FetchResult::Success(payload) => Some(payload),
            FetchResult::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            FetchResult::Success(_) => None,
            FetchResult::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Turns descriptors into data, consulting the cache before GitHub.
///
/// A cache hit never touches the network. On a miss the upstream response is
/// classified: 2xx bodies shaped like their kind are stored with the configured TTL, error
/// statuses invalidate the key, and transport or decode failures leave the
/// cache alone.
pub struct Fetcher {
    config: Config,
    upstream: Arc<dyn Upstream>,
    store: Arc<dyn CacheStore>,
}

impl Fetcher {
    pub fn new(config: Config, upstream: Arc<dyn Upstream>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            config,
            upstream,
            store,
        }
    }

    /// Fetcher talking to GitHub through a [`GitHubClient`] built from `config`.
    pub fn with_github(config: Config, store: Arc<dyn CacheStore>) -> Result<Self> {
        let client = GitHubClient::new(&config)?;
        Ok(Self::new(config, Arc::new(client), store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch a resource. Never fails: every outcome is a [`FetchResult`].
    pub async fn fetch(&self, descriptor: &ResourceDescriptor) -> FetchResult {
        let key = CacheKey::from(descriptor);

        match self.store.get(&key) {
            Ok(Some(entry)) => {
                debug!(%key, "cache hit");
                return FetchResult::Success(entry.into_value());
            }
            Ok(None) => debug!(%key, "cache miss"),
            Err(e) => warn!(%key, error = %e, "cache read failed, treating as miss"),
        }

        let url = endpoint_url(self.config.api_base(), descriptor);
        let response = match self.upstream.get(&url).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%key, error = %e, timed_out = e.timed_out, "GitHub request failed");
                return FetchResult::failure(FailureKind::Transport, e.message);
            }
        };

        self.classify(descriptor, &key, response)
    }

    /// Shared handle to the backing store.
    pub fn store(&self) -> Arc<dyn CacheStore> {
        Arc::clone(&self.store)
    }

    fn classify(
        &self,
        descriptor: &ResourceDescriptor,
        key: &CacheKey,
        response: RawResponse,
    ) -> FetchResult {
        let status = response.status;

        if response.is_success() {
            let payload = match decode_payload(descriptor.kind(), &response.body) {
                Ok(payload) => payload,
                Err(message) => {
                    warn!(%key, status, %message, "undecodable GitHub response");
                    return FetchResult::failure(FailureKind::Decode, message);
                }
            };

            let ttl = self.config.ttl_for(descriptor.kind());
            if let Err(e) = self.store.put(key, payload.clone(), ttl) {
                warn!(%key, error = %e, "cache write failed");
            }
            debug!(%key, ttl_secs = ttl.as_secs(), "cached GitHub response");
            return FetchResult::Success(payload);
        }

        self.invalidate(key);
        let message = response.error_message();
        let kind = if (400..500).contains(&status) {
            FailureKind::Client(status)
        } else {
            FailureKind::Server(status)
        };

        warn!(%key, status, %message, "GitHub returned an error");
        FetchResult::failure(kind, message)
    }

    fn invalidate(&self, key: &CacheKey) {
        if let Err(e) = self.store.delete(key) {
            warn!(%key, error = %e, "cache invalidation failed");
        }
    }
}

/// Parse a success body, accepting only a JSON object shaped like `kind`'s data.
fn decode_payload(kind: ResourceKind, body: &[u8]) -> std::result::Result<Value, String> {
    let value = match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => return Err("GitHub response was not a JSON object".to_string()),
        Err(e) => return Err(format!("GitHub response could not be decoded: {e}")),
    };

    let shape = match kind {
        ResourceKind::Profile => UserProfile::deserialize(&value).map(drop),
        ResourceKind::Repository => Repository::deserialize(&value).map(drop),
        ResourceKind::ProfileRepositoryList => SearchResults::deserialize(&value).map(drop),
    };
    match shape {
        Ok(()) => Ok(value),
        Err(e) => Err(format!("GitHub {kind} response was missing expected fields: {e}")),
    }
}
