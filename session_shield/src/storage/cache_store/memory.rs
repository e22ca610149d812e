use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::{CacheStore, InMemoryCacheStore};

const CACHE_PREFIX: &str = "cache";
const SWEEP_INTERVAL_SECS: i64 = 60;

impl InMemoryCacheStore {
    pub(crate) fn new() -> Self {
        tracing::info!("Creating new in-memory generic cache store");
        Self {
            entry: HashMap::new(),
            next_sweep: Utc::now() + Duration::seconds(SWEEP_INTERVAL_SECS),
        }
    }

    fn make_key(prefix: &str, key: &str) -> String {
        format!("{CACHE_PREFIX}:{prefix}:{key}")
    }

    fn live(&self, key: &str) -> Option<&CacheData> {
        match self.entry.get(key) {
            Some((data, Some(expires_at))) if *expires_at > Utc::now() => Some(data),
            Some((data, None)) => Some(data),
            _ => None,
        }
    }

    /// Drop expired entries, at most once per sweep interval
    fn sweep_expired(&mut self) {
        let now = Utc::now();
        if now < self.next_sweep {
            return;
        }
        let before = self.entry.len();
        self.entry
            .retain(|_, (_, expires_at)| expires_at.is_none_or(|at| at > now));
        self.next_sweep = now + Duration::seconds(SWEEP_INTERVAL_SECS);
        tracing::trace!(removed = before - self.entry.len(), "Swept expired cache entries");
    }

    fn insert(&mut self, key: String, value: CacheData, ttl: usize) {
        self.sweep_expired();
        let expires_at = (ttl > 0)
            .then(|| i64::try_from(ttl).ok())
            .flatten()
            .map(|secs| Utc::now() + Duration::seconds(secs));
        self.entry.insert(key, (value, expires_at));
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put_with_ttl(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<(), StorageError> {
        self.insert(Self::make_key(prefix, key), value, ttl);
        Ok(())
    }

    async fn put_if_not_exists(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<bool, StorageError> {
        let key = Self::make_key(prefix, key);
        if self.live(&key).is_some() {
            return Ok(false);
        }
        self.insert(key, value, ttl);
        Ok(true)
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        Ok(self.live(&Self::make_key(prefix, key)).cloned())
    }

    async fn remove(&mut self, prefix: &str, key: &str) -> Result<(), StorageError> {
        self.entry.remove(&Self::make_key(prefix, key));
        Ok(())
    }
}
