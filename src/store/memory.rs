//! In-process key-value store
//!
//! Default backend when no Redis server is configured, and the store used by
//! the test suite. Expired keys are dropped lazily on access.

use crate::store::traits::{KeyValueStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Thread-safe in-memory implementation of [`KeyValueStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `key` exists and has not expired
    pub fn contains_key(&self, key: &str) -> bool {
        match self.lock() {
            Ok(mut entries) => live_entry(&mut entries, key).is_some(),
            Err(_) => false,
        }
    }

    /// Remaining time to live of `key`, `None` without expiry or when absent
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let mut entries = self.lock().ok()?;
        let entry = live_entry(&mut entries, key)?;
        entry
            .expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

/// Returns the entry at `key`, removing it first if it has expired
fn live_entry<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    let now = Instant::now();
    if entries.get(key).map(|e| e.is_expired(now)).unwrap_or(false) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn hash_entry<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> StoreResult<&'a mut HashMap<String, String>> {
    if live_entry(entries, key).is_none() {
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            },
        );
    }

    match entries.get_mut(key).map(|e| &mut e.value) {
        Some(Value::Hash(hash)) => Ok(hash),
        _ => Err(wrong_type(key)),
    }
}

fn list_entry<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> StoreResult<&'a mut VecDeque<String>> {
    if live_entry(entries, key).is_none() {
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::List(VecDeque::new()),
                expires_at: None,
            },
        );
    }

    match entries.get_mut(key).map(|e| &mut e.value) {
        Some(Value::List(list)) => Ok(list),
        _ => Err(wrong_type(key)),
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Backend(format!(
        "WRONGTYPE operation against key '{}' holding the wrong kind of value",
        key
    ))
}

/// Resolves Redis-style inclusive list bounds to a half-open range
fn list_bounds(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize + 1))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.lock()?;
        hash_entry(&mut entries, key)?.insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut entries = self.lock()?;
        match live_entry(&mut entries, key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(Value::List(_)) => Err(wrong_type(key)),
        }
    }

    async fn hdel(&self, key: &str, field: &str) -> StoreResult<()> {
        let mut entries = self.lock()?;
        let now_empty = match live_entry(&mut entries, key).map(|e| &mut e.value) {
            None => return Ok(()),
            Some(Value::Hash(hash)) => {
                hash.remove(field);
                hash.is_empty()
            }
            Some(Value::List(_)) => return Err(wrong_type(key)),
        };

        if now_empty {
            entries.remove(key);
        }
        Ok(())
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let mut entries = self.lock()?;
        let hash = hash_entry(&mut entries, key)?;

        let current = match hash.get(field) {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                StoreError::Backend(format!("hash value of '{}' is not an integer", field))
            })?,
            None => 0,
        };

        let next = current + delta;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut entries = self.lock()?;
        match live_entry(&mut entries, key).map(|e| &e.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(Value::List(_)) => Err(wrong_type(key)),
        }
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.lock()?;
        list_entry(&mut entries, key)?.push_front(value.to_string());
        Ok(())
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> StoreResult<()> {
        let mut entries = self.lock()?;
        let now_empty = match live_entry(&mut entries, key).map(|e| &mut e.value) {
            None => return Ok(()),
            Some(Value::List(list)) => {
                match list_bounds(list.len(), start, stop) {
                    Some((from, to)) => {
                        list.truncate(to);
                        list.drain(..from);
                    }
                    None => list.clear(),
                }
                list.is_empty()
            }
            Some(Value::Hash(_)) => return Err(wrong_type(key)),
        };

        if now_empty {
            entries.remove(key);
        }
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        let mut entries = self.lock()?;
        match live_entry(&mut entries, key).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::List(list)) => Ok(match list_bounds(list.len(), start, stop) {
                Some((from, to)) => list.range(from..to).cloned().collect(),
                None => Vec::new(),
            }),
            Some(Value::Hash(_)) => Err(wrong_type(key)),
        }
    }

    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<()> {
        let mut entries = self.lock()?;
        if let Some(entry) = live_entry(&mut entries, key) {
            entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_operations() {
        let store = MemoryStore::new();

        store.hset("h", "a", "1").await.unwrap();
        store.hset("h", "b", "2").await.unwrap();
        assert_eq!(store.hget("h", "a").await.unwrap(), Some("1".to_string()));
        assert_eq!(store.hget("h", "zzz").await.unwrap(), None);
        assert_eq!(store.hget("missing", "a").await.unwrap(), None);

        store.hdel("h", "a").await.unwrap();
        let all = store.hgetall("h").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["b"], "2");
    }

    #[tokio::test]
    async fn test_hincr_by() {
        let store = MemoryStore::new();
        assert_eq!(store.hincr_by("m", "items", 1).await.unwrap(), 1);
        assert_eq!(store.hincr_by("m", "items", 4).await.unwrap(), 5);
        assert_eq!(store.hget("m", "items").await.unwrap(), Some("5".to_string()));

        store.hset("m", "name", "abc").await.unwrap();
        assert!(store.hincr_by("m", "name", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_list_push_trim_range() {
        let store = MemoryStore::new();
        for i in 0..50 {
            store.lpush("log", &format!("line {}", i)).await.unwrap();
        }

        store.ltrim("log", 0, 40).await.unwrap();
        let all = store.lrange("log", 0, -1).await.unwrap();
        assert_eq!(all.len(), 41);
        assert_eq!(all[0], "line 49");
        assert_eq!(all[40], "line 9");

        assert_eq!(store.lrange("log", -2, -1).await.unwrap(), vec!["line 10", "line 9"]);
        assert!(store.lrange("log", 100, 200).await.unwrap().is_empty());
        assert!(store.lrange("nothing", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        store.lpush("log", "x").await.unwrap();
        assert!(matches!(
            store.hset("log", "a", "b").await,
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_expire() {
        let store = MemoryStore::new();
        store.hset("h", "a", "1").await.unwrap();
        assert!(store.ttl("h").is_none());

        store.expire("h", 600).await.unwrap();
        let ttl = store.ttl("h").unwrap();
        assert!(ttl <= Duration::from_secs(600) && ttl > Duration::from_secs(590));

        store.expire("h", 0).await.unwrap();
        assert!(!store.contains_key("h"));
        assert_eq!(store.hget("h", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expire_missing_key_is_noop() {
        let store = MemoryStore::new();
        store.expire("nothing", 10).await.unwrap();
        assert!(!store.contains_key("nothing"));
    }

    #[test]
    fn test_list_bounds() {
        assert_eq!(list_bounds(10, 0, -1), Some((0, 10)));
        assert_eq!(list_bounds(10, 0, 40), Some((0, 10)));
        assert_eq!(list_bounds(10, -3, -1), Some((7, 10)));
        assert_eq!(list_bounds(10, 5, 2), None);
        assert_eq!(list_bounds(0, 0, -1), None);
    }
}
