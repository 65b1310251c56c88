//! In-memory [`LocalCache`].

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::ports::{CacheKey, LocalCache, LocalCacheError};

/// Cache for one simulated device. Two instances never share entries.
#[derive(Debug, Default)]
pub struct MemoryLocalCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryLocalCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw value without going through the port, e.g. to plant a
    /// corrupt entry.
    pub async fn insert_raw(&self, key: &CacheKey, value: impl Into<String>) {
        self.entries
            .lock()
            .await
            .insert(key.as_str().to_owned(), value.into());
    }
}

#[async_trait]
impl LocalCache for MemoryLocalCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, LocalCacheError> {
        Ok(self.entries.lock().await.get(key.as_str()).cloned())
    }

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), LocalCacheError> {
        self.insert_raw(key, value).await;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), LocalCacheError> {
        self.entries.lock().await.remove(key.as_str());
        Ok(())
    }
}
