//! Asset resolution
//!
//! Maps opaque segment identifiers to playable URIs through an
//! [`AssetStore`]. The identifier → URI mapping is cached for the lifetime of
//! the resolver (no eviction; a sequence holds tens of entries).
//!
//! Concurrent `resolve` calls for the same identifier share one in-flight
//! remote lookup: the first caller performs it, later callers wait for its
//! result. Failures are not cached, so the next call retries.

pub mod store;

pub use store::{AssetStore, HttpObjectStore, StaticAssetStore, StoreError};

use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};

/// Optional descriptive metadata attached to a resolved source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
}

/// Result of resolving one segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSource {
    /// Playable URI
    pub uri: String,
    pub metadata: Option<SourceMetadata>,
}

/// Identifier → URI resolver with a coalescing cache
pub struct AssetResolver {
    store: Arc<dyn AssetStore>,
    path_template: String,
    timeout: Duration,
    urls: RwLock<HashMap<String, Arc<OnceCell<String>>>>,
    remote_lookups: AtomicU64,
}

impl AssetResolver {
    pub fn new(store: Arc<dyn AssetStore>, config: &PlayerConfig) -> Self {
        Self {
            store,
            path_template: config.asset_path_template.clone(),
            timeout: config.resolve_timeout(),
            urls: RwLock::new(HashMap::new()),
            remote_lookups: AtomicU64::new(0),
        }
    }

    /// Resolve `id` to a playable source without metadata
    pub async fn resolve(&self, id: &str) -> Result<ResolvedSource> {
        self.resolve_with(id, None).await
    }

    /// Resolve `id` and attach `metadata` to the returned source
    pub async fn resolve_with(
        &self,
        id: &str,
        metadata: Option<SourceMetadata>,
    ) -> Result<ResolvedSource> {
        let uri = self.resolve_uri(id).await?;
        Ok(ResolvedSource { uri, metadata })
    }

    /// Warm the cache for `id`
    pub async fn preload(&self, id: &str) -> Result<String> {
        self.resolve_uri(id).await.map_err(|e| {
            warn!(segment_id = %id, "Failed to preload asset: {}", e);
            e
        })
    }

    /// Cached URI for `id`, if resolved
    pub async fn cached_uri(&self, id: &str) -> Option<String> {
        let urls = self.urls.read().await;
        urls.get(id).and_then(|cell| cell.get().cloned())
    }

    /// Drop every cached mapping
    pub async fn clear_cache(&self) {
        let mut urls = self.urls.write().await;
        let count = urls.len();
        urls.clear();
        debug!("Cleared {} cached asset URLs", count);
    }

    /// Number of remote lookups issued so far
    pub fn remote_lookups(&self) -> u64 {
        self.remote_lookups.load(Ordering::Relaxed)
    }

    async fn resolve_uri(&self, id: &str) -> Result<String> {
        let cell = {
            let mut urls = self.urls.write().await;
            urls.entry(id.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        if let Some(uri) = cell.get() {
            debug!(segment_id = %id, "Asset URL cache hit");
            return Ok(uri.clone());
        }

        let uri = cell.get_or_try_init(|| self.lookup(id)).await?;
        Ok(uri.clone())
    }

    async fn lookup(&self, id: &str) -> Result<String> {
        let path = self.path_template.replace(crate::config::ID_PLACEHOLDER, id);
        self.remote_lookups.fetch_add(1, Ordering::Relaxed);
        debug!(segment_id = %id, path = %path, "Resolving asset");

        match tokio::time::timeout(self.timeout, self.store.download_url(&path)).await {
            Ok(Ok(uri)) => {
                debug!(segment_id = %id, uri = %uri, "Resolved asset");
                Ok(uri)
            }
            Ok(Err(e)) => Err(Error::Resolution {
                id: id.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::Timeout {
                operation: "resolve",
                id: id.to_string(),
                after_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

impl std::fmt::Debug for AssetResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetResolver")
            .field("path_template", &self.path_template)
            .field("timeout", &self.timeout)
            .field("remote_lookups", &self.remote_lookups())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with(store: StaticAssetStore) -> (AssetResolver, Arc<StaticAssetStore>) {
        let store = Arc::new(store);
        let resolver = AssetResolver::new(store.clone(), &PlayerConfig::default());
        (resolver, store)
    }

    #[tokio::test]
    async fn test_resolve_caches_mapping() {
        let (resolver, store) =
            resolver_with(StaticAssetStore::new().with_object("Videos/W059.mp4", "mem://W059"));

        let first = resolver.resolve("W059").await.unwrap();
        let second = resolver.resolve("W059").await.unwrap();

        assert_eq!(first.uri, "mem://W059");
        assert_eq!(first, second);
        assert_eq!(store.lookups(), 1);
        assert_eq!(resolver.cached_uri("W059").await.as_deref(), Some("mem://W059"));
    }

    #[tokio::test]
    async fn test_resolve_with_metadata() {
        let (resolver, _) =
            resolver_with(StaticAssetStore::new().with_object("Videos/W059.mp4", "mem://W059"));
        let metadata = SourceMetadata {
            title: Some("Beginner Hip Opening".to_string()),
            artist: None,
        };

        let source = resolver.resolve_with("W059", Some(metadata.clone())).await.unwrap();
        assert_eq!(source.metadata, Some(metadata));
    }

    #[tokio::test]
    async fn test_not_found_is_resolution_error_and_not_cached() {
        let (resolver, store) = resolver_with(StaticAssetStore::new());

        let err = resolver.resolve("missing").await.unwrap_err();
        assert!(err.is_resolution());
        assert!(resolver.cached_uri("missing").await.is_none());

        // Failure is retried on the next call
        let _ = resolver.resolve("missing").await;
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn test_preload_warms_cache() {
        let (resolver, store) =
            resolver_with(StaticAssetStore::new().with_object("Videos/a.mp4", "mem://a"));

        assert_eq!(resolver.preload("a").await.unwrap(), "mem://a");
        assert_eq!(resolver.cached_uri("a").await.as_deref(), Some("mem://a"));

        // Served from the warmed cache
        assert_eq!(resolver.resolve("a").await.unwrap().uri, "mem://a");
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn test_preload_failure_is_returned() {
        let (resolver, store) = resolver_with(StaticAssetStore::new());

        let err = resolver.preload("missing").await.unwrap_err();
        assert!(matches!(err, Error::Resolution { ref id, .. } if id == "missing"));
        assert!(resolver.cached_uri("missing").await.is_none());
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_new_lookup() {
        let (resolver, store) =
            resolver_with(StaticAssetStore::new().with_object("Videos/a.mp4", "mem://a"));

        resolver.resolve("a").await.unwrap();
        resolver.clear_cache().await;
        assert!(resolver.cached_uri("a").await.is_none());
        resolver.resolve("a").await.unwrap();

        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_resolves_are_coalesced() {
        let (resolver, store) = resolver_with(
            StaticAssetStore::new()
                .with_object("Videos/a.mp4", "mem://a")
                .with_latency(Duration::from_millis(200)),
        );

        let (a, b, c) = tokio::join!(
            resolver.resolve("a"),
            resolver.resolve("a"),
            resolver.resolve("a")
        );

        assert_eq!(a.unwrap().uri, "mem://a");
        assert_eq!(b.unwrap().uri, "mem://a");
        assert_eq!(c.unwrap().uri, "mem://a");
        assert_eq!(store.lookups(), 1);
        assert_eq!(resolver.remote_lookups(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        let mut config = PlayerConfig::default();
        config.resolve_timeout_ms = 100;
        let store = Arc::new(
            StaticAssetStore::new()
                .with_object("Videos/a.mp4", "mem://a")
                .with_latency(Duration::from_secs(5)),
        );
        let resolver = AssetResolver::new(store, &config);

        let err = resolver.resolve("a").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { operation: "resolve", .. }));
        assert!(err.is_resolution());
    }
}
