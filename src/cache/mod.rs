//! Analysis Cache
//!
//! Namespaced key/value cache with per-key expiry, fronting a pluggable
//! byte backend. Values go through the two-tier codec in [`codec`].

pub mod codec;
pub mod key;
pub mod redis_store;
pub mod store;

pub use codec::CacheValue;
pub use key::derive_cache_key;
pub use redis_store::RedisCacheBackend;
pub use store::{CacheBackend, InMemoryCacheBackend, KeyTtl};

use crate::config::Settings;
use crate::error::OrchestrationError;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sub-namespace for end-to-end analyses
pub const ANALYSIS_NAMESPACE: &str = "analysis:";

#[derive(Clone)]
pub struct CacheManager {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    default_ttl: Duration,
}

impl CacheManager {
    pub fn new(backend: Arc<dyn CacheBackend>, prefix: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            default_ttl,
        }
    }

    /// Process-local cache
    pub fn in_memory(prefix: impl Into<String>, default_ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryCacheBackend::new()), prefix, default_ttl)
    }

    /// Same backend and TTL, keys nested one level deeper
    pub fn namespaced(&self, namespace: &str) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            prefix: format!("{}{}", self.prefix, namespace),
            default_ttl: self.default_ttl,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let full_key = self.make_key(key);

        let bytes = self.backend.get(&full_key).await.map_err(|e| {
            error!(key = %full_key, error = %e, "Cache get failed");
            OrchestrationError::Cache(e.to_string())
        })?;

        Ok(bytes.map(|bytes| {
            debug!(key = %full_key, bytes = bytes.len(), "Cache hit");
            CacheValue::decode(&bytes)
        }))
    }

    /// Fetch and decode into `T`; an undecodable value is reported as an error
    pub async fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(value) => Ok(Some(value.into_typed()?)),
            None => Ok(None),
        }
    }

    /// Store a value; `ttl` of `None` uses the default TTL
    pub async fn set(&self, key: &str, value: &CacheValue, ttl: Option<Duration>) -> Result<()> {
        let full_key = self.make_key(key);
        let bytes = value.encode()?;
        let ttl = ttl.unwrap_or(self.default_ttl);

        self.backend
            .set(&full_key, bytes, Some(ttl))
            .await
            .map_err(|e| {
                error!(key = %full_key, error = %e, "Cache set failed");
                OrchestrationError::Cache(e.to_string())
            })?;

        debug!(key = %full_key, ttl_secs = ttl.as_secs(), "Cache set");
        Ok(())
    }

    pub async fn set_structured<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.set(key, &CacheValue::structured(value)?, ttl).await
    }

    pub async fn set_opaque<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.set(key, &CacheValue::opaque(value)?, ttl).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let full_key = self.make_key(key);
        self.backend.delete(&full_key).await.map_err(|e| {
            error!(key = %full_key, error = %e, "Cache delete failed");
            OrchestrationError::Cache(e.to_string())
        })
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let full_key = self.make_key(key);
        self.backend
            .exists(&full_key)
            .await
            .map_err(|e| OrchestrationError::Cache(e.to_string()))
    }

    /// Remaining TTL in seconds (-2 missing, -1 no expiry)
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let full_key = self.make_key(key);
        let ttl = self
            .backend
            .ttl(&full_key)
            .await
            .map_err(|e| OrchestrationError::Cache(e.to_string()))?;
        Ok(ttl.as_secs())
    }

    /// Remove every key under `{prefix}{pattern}`
    pub async fn clear_prefix(&self, pattern: &str) -> Result<usize> {
        let full_prefix = self.make_key(pattern);
        let removed = self.backend.delete_prefix(&full_prefix).await.map_err(|e| {
            error!(prefix = %full_prefix, error = %e, "Cache clear failed");
            OrchestrationError::Cache(e.to_string())
        })?;

        debug!(prefix = %full_prefix, removed, "Cache cleared");
        Ok(removed)
    }

    pub async fn health_check(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Cache health check failed");
                false
            }
        }
    }
}

/// Redis when a URL is configured and reachable, in-memory otherwise
pub async fn build_cache(settings: &Settings) -> CacheManager {
    let backend: Arc<dyn CacheBackend> = match settings.redis_url.as_deref() {
        Some(url) => match RedisCacheBackend::connect(url).await {
            Ok(backend) => {
                info!("Cache backend: redis");
                Arc::new(backend)
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to redis cache, falling back to in-memory");
                Arc::new(InMemoryCacheBackend::new())
            }
        },
        None => {
            info!("Cache backend: in-memory");
            Arc::new(InMemoryCacheBackend::new())
        }
    };

    CacheManager::new(backend, settings.cache_prefix.clone(), settings.cache_ttl())
}
