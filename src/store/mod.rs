//! Store module for selectors and job metadata
//!
//! This module handles:
//! - The key-value backend abstraction (in-memory or Redis)
//! - Selector persistence keyed by host and type
//! - Job start/finish metadata, per-record counters and the operational log

mod memory;
#[cfg(feature = "redis-backend")]
mod redis_store;
mod scrap_data;
mod traits;

pub use memory::MemoryStore;
#[cfg(feature = "redis-backend")]
pub use redis_store::RedisStore;
pub use scrap_data::{JobReport, ScrapData, JOB_ITEMS_TTL_SECS, JOB_META_TTL_SECS};
pub use traits::{KeyValueStore, StoreError, StoreResult};

use crate::config::{StoreBackend, StoreConfig};
use crate::Result;
use std::sync::Arc;

/// Opens the store backend named by the configuration
///
/// # Arguments
///
/// * `config` - The store section of the configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn KeyValueStore>)` - The connected backend
/// * `Err(HarvestError)` - The backend could not be opened
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => open_redis(config).await,
    }
}

#[cfg(feature = "redis-backend")]
async fn open_redis(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>> {
    let url = config
        .redis_url
        .as_deref()
        .ok_or_else(|| crate::ConfigError::Validation("redis-url is required".to_string()))?;
    Ok(Arc::new(RedisStore::connect(url).await?))
}

#[cfg(not(feature = "redis-backend"))]
async fn open_redis(_config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>> {
    Err(StoreError::Backend(
        "the redis backend requires building with the `redis-backend` feature".to_string(),
    )
    .into())
}
