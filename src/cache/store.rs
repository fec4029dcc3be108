// Cache store contract and in-memory implementation.
// Entries carry their own TTL; expired entries read as absent and are dropped lazily.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

use super::key::CacheKey;

/// Default TTL for cached payloads: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A cached payload with its storage metadata.
///
/// Entries are immutable once created; refreshing a key replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    value: Value,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    /// Create an entry stored now.
    pub fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Utc::now(),
            ttl,
        }
    }

    #[cfg(test)]
    pub(crate) fn stored_at_time(value: Value, ttl: Duration, stored_at: DateTime<Utc>) -> Self {
        Self {
            value,
            stored_at,
            ttl,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether the entry has expired as of `now` (`now - stored_at >= ttl`).
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        // A stored_at in the future (clock skew) counts as zero elapsed.
        let elapsed = now
            .signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        elapsed >= self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Key-value store with per-entry expiry.
///
/// `get` never returns an expired entry. `put` overwrites unconditionally and
/// `delete` is idempotent, so concurrent writers are last-writer-wins.
pub trait CacheStore: Send + Sync {
    /// Look up a live entry.
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Store `value` under `key`, stamped now, replacing any existing entry.
    fn put(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<()>;

    /// Remove the entry for `key`, if any.
    fn delete(&self, key: &CacheKey) -> Result<()>;
}

/// Process-local cache backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physically held entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // Map stays consistent across a panicked holder.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.clone())),
            None => Ok(None),
        }
    }

    fn put(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<()> {
        self.lock().insert(key.clone(), CacheEntry::new(value, ttl));
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}
