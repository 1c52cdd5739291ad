//! Redis-backed key-value store
//!
//! Enabled with the `redis-backend` feature. Uses a multiplexed connection
//! manager that reconnects on its own, so one instance is shared by every
//! crawl of an engine.

use crate::store::traits::{KeyValueStore, StoreError, StoreResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;

/// [`KeyValueStore`] over a Redis server
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connects to the Redis server at `url` (`redis://host:port/db`)
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(backend)?;
        let conn = ConnectionManager::new(client).await.map_err(backend)?;
        tracing::info!("Connected to Redis at {}", url);
        Ok(Self { conn })
    }
}

fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await.map_err(backend)?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.hget(key, field).await.map_err(backend)
    }

    async fn hdel(&self, key: &str, field: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(key, field).await.map_err(backend)?;
        Ok(())
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        conn.hincr(key, field, delta).await.map_err(backend)
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        conn.hgetall(key).await.map_err(backend)
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(key, value).await.map_err(backend)?;
        Ok(())
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.ltrim(key, start, stop).await.map_err(backend)?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.lrange(key, start, stop).await.map_err(backend)
    }

    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        let _: () = conn.expire(key, seconds).await.map_err(backend)?;
        Ok(())
    }
}
