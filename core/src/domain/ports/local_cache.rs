//! Port for the device-local key/value cache.
//!
//! Values are opaque strings; callers own their encoding. The cache is
//! persistent across process restarts but never shared between devices.
use async_trait::async_trait;

use super::{CacheKey, define_port_error};

define_port_error! {
    /// Errors surfaced by local cache adapters.
    pub enum LocalCacheError {
        /// Underlying storage failed.
        Backend { message: String } => "local cache backend failure: {message}",
    }
}

/// String-keyed, string-valued persistent store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Read a value, `None` when absent.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, LocalCacheError>;

    /// Store a value, replacing any previous one.
    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), LocalCacheError>;

    /// Remove a value. Removing a missing key succeeds.
    async fn remove(&self, key: &CacheKey) -> Result<(), LocalCacheError>;
}
