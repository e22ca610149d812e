use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

pub(crate) struct InMemoryCacheStore {
    pub(super) entry: HashMap<String, (CacheData, Option<DateTime<Utc>>)>,
    /// Expired entries are dropped by the first write after this instant
    pub(super) next_sweep: DateTime<Utc>,
}

pub(crate) struct RedisCacheStore {
    pub(super) client: redis::Client,
}

#[async_trait]
pub(crate) trait CacheStore: Send + Sync + 'static {
    /// Initialize the store. This is called when the store is created.
    async fn init(&self) -> Result<(), StorageError>;

    /// Put an entry into the store, expiring after `ttl` seconds (0 keeps it forever).
    async fn put_with_ttl(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<(), StorageError>;

    /// Put an entry only if the key is free. Returns false if it already existed.
    async fn put_if_not_exists(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<bool, StorageError>;

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError>;

    async fn remove(&mut self, prefix: &str, key: &str) -> Result<(), StorageError>;
}
