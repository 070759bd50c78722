//! Cache capability: `get(key)`, `set(key, value, ttl)`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache value could not be encoded: {0}")]
    Encode(String),
}

/// Key/value store with per-entry time-to-live.
///
/// Shared by every concurrent request; implementations must be safe for
/// concurrent use. Values are opaque strings (callers serialise).
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Verify the backend is reachable. Called once while the orchestrator starts.
    async fn health_check(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Entry count at which `set` sweeps out expired entries.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 1024;

/// Process-local cache.
///
/// Expired entries are evicted on read, and swept from the whole map by `set`
/// once it holds `sweep_threshold` entries.
#[derive(Debug)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    sweep_threshold: usize,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self {
            entries: RwLock::default(),
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
        }
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold.max(1);
        self
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Encode(format!("ttl {ttl:?} overflows the clock")))?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.sweep_threshold {
            entries.retain(|_, entry| entry.expires_at > now);
        }
        entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }
}
