//! Store traits and error types
//!
//! This module defines the key-value interface behind selector persistence
//! and job bookkeeping, and the associated error types.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Selector not found: {key}")]
    SelectorNotFound { key: String },

    #[error("Scrap job not found: {0}")]
    JobNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true for "no such selector" and "no such job"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SelectorNotFound { .. } | Self::JobNotFound(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for key-value backends
///
/// The operations mirror a Redis subset: hashes, lists and key expiry.
/// Every call touches a single key; there are no transactions.
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    // ===== Hashes =====

    /// Sets `field` of the hash at `key`
    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Gets `field` of the hash at `key`, `None` when either is absent
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Deletes `field` from the hash at `key`
    async fn hdel(&self, key: &str, field: &str) -> StoreResult<()>;

    /// Adds `delta` to the integer stored in `field`, returning the new value
    ///
    /// A missing field counts as 0.
    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64>;

    /// Returns every field of the hash at `key` (empty when absent)
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    // ===== Lists =====

    /// Pushes `value` to the head of the list at `key`
    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Keeps only the elements between `start` and `stop` (inclusive)
    ///
    /// Negative indices count from the tail, as in Redis `LTRIM`.
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> StoreResult<()>;

    /// Returns the elements between `start` and `stop` (inclusive)
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>>;

    // ===== Keys =====

    /// Expires `key` after `seconds`
    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<()>;
}
