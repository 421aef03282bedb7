//! TTL cache for run artifacts.
//!
//! The store is abstracted behind a trait; the default is in-memory.
//! Entries are `{value, expires_at}` pairs: a value read after its TTL is
//! treated as absent and removed lazily, with a `sweep` available for
//! periodic cleanup. Writes are last-writer-wins. Stores are shared across
//! concurrent runs but keyed per run identity.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::types::identity::AuditIdentity;

/// Artifact families with distinct TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    RawSnapshot,
    SiteSnapshot,
    PublicReport,
    PrivateFlags,
}

impl CacheKind {
    fn prefix(&self) -> &'static str {
        match self {
            CacheKind::RawSnapshot => "rawSnapshot",
            CacheKind::SiteSnapshot => "siteSnapshot",
            CacheKind::PublicReport => "publicReport",
            CacheKind::PrivateFlags => "privateFlags",
        }
    }
}

/// Build the canonical cache key: `{type}:{cacheKey}:{normalizedUrl}`.
pub fn cache_entry_key(kind: CacheKind, identity: &AuditIdentity) -> String {
    format!(
        "{}:{}:{}",
        kind.prefix(),
        identity.cache_key,
        identity.normalized_url
    )
}

/// Backend contract for cache storage.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live value; expired entries count as absent.
    async fn get_value(&self, key: &str) -> Option<serde_json::Value>;

    /// Store a value with a TTL. Last writer wins.
    async fn put_value(&self, key: &str, value: serde_json::Value, ttl: Duration);

    /// Remove one entry.
    async fn remove(&self, key: &str);

    /// Drop every expired entry.
    async fn sweep(&self);
}

struct Entry {
    value: serde_json::Value,
    expires_at: DateTime<Utc>,
}

/// In-memory cache store. Suitable for a single process; the trait is the
/// seam for anything durable.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        let expired = {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if entry.expires_at > Utc::now() => {
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            self.entries.write().unwrap().remove(key);
        }
        None
    }

    async fn put_value(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        let expires_at = Utc::now()
            + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::hours(1));
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), Entry { value, expires_at });
    }

    async fn remove(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }

    async fn sweep(&self) {
        let now = Utc::now();
        self.entries
            .write()
            .unwrap()
            .retain(|_, entry| entry.expires_at > now);
    }
}

/// Typed facade over a shared cache store.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Default in-memory cache.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    /// Typed read; deserialization failures count as a miss.
    pub async fn get<T: DeserializeOwned>(
        &self,
        kind: CacheKind,
        identity: &AuditIdentity,
    ) -> Option<T> {
        let key = cache_entry_key(kind, identity);
        let value = self.store.get_value(&key).await?;
        serde_json::from_value(value).ok()
    }

    /// Typed write. Serialization failures are logged and dropped - caching
    /// is an optimization, not a contract.
    pub async fn put<T: Serialize>(
        &self,
        kind: CacheKind,
        identity: &AuditIdentity,
        value: &T,
        ttl: Duration,
    ) {
        let key = cache_entry_key(kind, identity);
        match serde_json::to_value(value) {
            Ok(json) => self.store.put_value(&key, json, ttl).await,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache serialization failed");
            }
        }
    }

    pub async fn remove(&self, kind: CacheKind, identity: &AuditIdentity) {
        self.store.remove(&cache_entry_key(kind, identity)).await;
    }

    pub async fn sweep(&self) {
        self.store.sweep().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> AuditIdentity {
        AuditIdentity::new("https://example.com", None, "t=1", "p=1").unwrap()
    }

    #[test]
    fn test_key_layout() {
        let identity = identity();
        let key = cache_entry_key(CacheKind::RawSnapshot, &identity);
        assert!(key.starts_with("rawSnapshot:"));
        assert!(key.ends_with(":https://example.com/"));
        assert_eq!(key.split(':').next(), Some("rawSnapshot"));
    }

    #[tokio::test]
    async fn test_round_trip() {
        let cache = Cache::in_memory();
        let identity = identity();

        cache
            .put(
                CacheKind::PublicReport,
                &identity,
                &"hello".to_string(),
                Duration::from_secs(60),
            )
            .await;

        let value: Option<String> = cache.get(CacheKind::PublicReport, &identity).await;
        assert_eq!(value.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_expired_read_is_absent() {
        let store = Arc::new(MemoryCache::new());
        let cache = Cache::new(store.clone());
        let identity = identity();

        cache
            .put(
                CacheKind::PrivateFlags,
                &identity,
                &42u32,
                Duration::from_secs(0),
            )
            .await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let value: Option<u32> = cache.get(CacheKind::PrivateFlags, &identity).await;
        assert!(value.is_none());

        // Lazy removal happened on read
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_sweep_drops_expired() {
        let store = Arc::new(MemoryCache::new());
        store
            .put_value("a", serde_json::json!(1), Duration::from_secs(0))
            .await;
        store
            .put_value("b", serde_json::json!(2), Duration::from_secs(600))
            .await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        store.sweep().await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = Cache::in_memory();
        let identity = identity();

        cache
            .put(CacheKind::SiteSnapshot, &identity, &1u32, Duration::from_secs(60))
            .await;
        cache
            .put(CacheKind::SiteSnapshot, &identity, &2u32, Duration::from_secs(60))
            .await;

        let value: Option<u32> = cache.get(CacheKind::SiteSnapshot, &identity).await;
        assert_eq!(value, Some(2));
    }
}
