//! Byte-level cache backends
//!
//! Backends only see namespaced keys and encoded bytes; value encoding
//! lives in `codec`. Every operation is atomic per key.

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Remaining lifetime of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    Persistent,
    Expires(Duration),
}

impl KeyTtl {
    /// Seconds left, with -2 for a missing key and -1 for a key without expiry
    pub fn as_secs(&self) -> i64 {
        match self {
            KeyTtl::Missing => -2,
            KeyTtl::Persistent => -1,
            KeyTtl::Expires(remaining) => remaining.as_secs() as i64,
        }
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// `None` stores the value without expiry
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Returns whether a live key was removed
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl>;

    /// Remove every key starting with `prefix`, returning how many went
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Minimum spacing between sweeps triggered by writes
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entries {
    map: HashMap<String, Entry>,
    last_sweep: Instant,
}

impl Entries {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| !entry.is_expired(now));
        self.last_sweep = now;
        before - self.map.len()
    }
}

/// Process-local backend on the tokio clock
///
/// Expired entries are dropped when read, and swept in bulk by the first
/// write after each [`SWEEP_INTERVAL`].
pub struct InMemoryCacheBackend {
    entries: RwLock<Entries>,
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Drop every expired entry; returns the number removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.entries.write().await.sweep(now)
    }

    /// Live entries only
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .map
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Entries held in memory, expired or not
    pub async fn held(&self) -> usize {
        self.entries.read().await.map.len()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.map.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // expired: evict under the write lock, unless a writer replaced it meanwhile
        let mut entries = self.entries.write().await;
        if entries.map.get(key).map_or(false, |e| e.is_expired(now)) {
            entries.map.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let now = Instant::now();
        let expires_at = ttl.map(|ttl| now + ttl);
        let mut entries = self.entries.write().await;

        if now.saturating_duration_since(entries.last_sweep) >= SWEEP_INTERVAL {
            let swept = entries.sweep(now);
            if swept > 0 {
                debug!(swept, "Swept expired cache entries");
            }
        }

        entries.map.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let removed = self.entries.write().await.map.remove(key);
        Ok(removed.map_or(false, |entry| !entry.is_expired(now)))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .map
            .get(key)
            .map_or(false, |entry| !entry.is_expired(now)))
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let now = Instant::now();
        let entries = self.entries.read().await;

        Ok(match entries.map.get(key) {
            None => KeyTtl::Missing,
            Some(entry) if entry.is_expired(now) => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(now)),
        })
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut removed = 0;

        entries.map.retain(|key, entry| {
            if key.starts_with(prefix) {
                if !entry.is_expired(now) {
                    removed += 1;
                }
                false
            } else {
                true
            }
        });

        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_on_simulated_clock() {
        let backend = InMemoryCacheBackend::new();
        backend
            .set("k", b"v".to_vec(), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(backend.ttl("k").await.unwrap(), KeyTtl::Expires(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(!backend.exists("k").await.unwrap());
        assert_eq!(backend.ttl("k").await.unwrap().as_secs(), -2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_entry_never_expires() {
        let backend = InMemoryCacheBackend::new();
        backend.set("k", b"v".to_vec(), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(86_400)).await;
        assert!(backend.exists("k").await.unwrap());
        assert_eq!(backend.ttl("k").await.unwrap().as_secs(), -1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let backend = InMemoryCacheBackend::new();
        backend.set("short", vec![1], Some(Duration::from_secs(1))).await.unwrap();
        backend.set("long", vec![2], Some(Duration::from_secs(100))).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(backend.purge_expired().await, 1);
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_sweep_expired_entries() {
        let backend = InMemoryCacheBackend::new();
        for i in 0..1000 {
            backend
                .set(&format!("q{}", i), vec![0; 16], Some(Duration::from_secs(1)))
                .await
                .unwrap();
        }
        assert_eq!(backend.held().await, 1000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        backend.set("fresh", vec![1], None).await.unwrap();

        assert_eq!(backend.len().await, 1);
        assert_eq!(backend.held().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_waits_for_interval() {
        let backend = InMemoryCacheBackend::new();
        backend.set("short", vec![1], Some(Duration::from_secs(1))).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        backend.set("other", vec![2], None).await.unwrap();
        assert_eq!(backend.held().await, 2);
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_and_prefix_delete() {
        let backend = InMemoryCacheBackend::new();
        backend.set("a:1", vec![1], None).await.unwrap();
        backend.set("a:2", vec![2], None).await.unwrap();
        backend.set("b:1", vec![3], None).await.unwrap();

        assert!(backend.delete("a:1").await.unwrap());
        assert!(!backend.delete("a:1").await.unwrap());
        assert_eq!(backend.delete_prefix("a:").await.unwrap(), 1);
        assert!(backend.exists("b:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_sets_on_one_key_leave_one_whole_value() {
        let backend = Arc::new(InMemoryCacheBackend::new());
        let mut handles = Vec::new();

        for i in 0..32u8 {
            let backend = Arc::clone(&backend);
            handles.push(tokio::spawn(async move {
                backend.set("shared", vec![i; 64], None).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let value = backend.get("shared").await.unwrap().unwrap();
        assert_eq!(value.len(), 64);
        assert!(value.iter().all(|b| *b == value[0]));
    }
}
