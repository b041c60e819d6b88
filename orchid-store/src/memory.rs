use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use orchid_core::{DecisionCache, OrchidError};

struct Entry {
    value: Value,
    inserted: Instant,
    ttl: Duration,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted) >= self.ttl
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// Thread-safe in-memory TTL cache with a hard size cap. When full, the
/// oldest tenth of the entries is evicted to make room.
pub struct MemoryCache {
    inner: RwLock<HashMap<String, Entry>>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_size: max_size.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let size = self.inner.read().map(|guard| guard.len()).unwrap_or(0);
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size,
        }
    }

    fn evict_oldest(guard: &mut HashMap<String, Entry>, max_size: usize) {
        let to_remove = (max_size / 10).max(1);
        let mut by_age: Vec<(String, Instant)> = guard
            .iter()
            .map(|(key, entry)| (key.clone(), entry.inserted))
            .collect();
        by_age.sort_by_key(|(_, inserted)| *inserted);
        for (key, _) in by_age.into_iter().take(to_remove) {
            guard.remove(&key);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(500)
    }
}

#[async_trait]
impl DecisionCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, OrchidError> {
        {
            let guard = self
                .inner
                .read()
                .map_err(|_| OrchidError::CacheFailed("lock poisoned".into()))?;
            match guard.get(key) {
                Some(entry) if !entry.expired(Instant::now()) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
            }
        }
        // Expired on the read path. Re-check under the write lock: a
        // concurrent set may have refreshed the entry in the window.
        let mut guard = self
            .inner
            .write()
            .map_err(|_| OrchidError::CacheFailed("lock poisoned".into()))?;
        match guard.get(key) {
            Some(entry) if !entry.expired(Instant::now()) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value.clone()))
            }
            _ => {
                guard.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), OrchidError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| OrchidError::CacheFailed("lock poisoned".into()))?;
        if guard.len() >= self.max_size && !guard.contains_key(key) {
            Self::evict_oldest(&mut guard, self.max_size);
        }
        guard.insert(
            key.to_string(),
            Entry {
                value,
                inserted: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), OrchidError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| OrchidError::CacheFailed("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, OrchidError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| OrchidError::CacheFailed("lock poisoned".into()))?;
        Ok(guard
            .get(key)
            .map(|entry| !entry.expired(Instant::now()))
            .unwrap_or(false))
    }

    async fn clear(&self) -> Result<(), OrchidError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| OrchidError::CacheFailed("lock poisoned".into()))?;
        guard.clear();
        Ok(())
    }
}
