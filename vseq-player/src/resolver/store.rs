//! Remote object storage backends
//!
//! An [`AssetStore`] maps an object path (e.g. `Videos/W059.mp4`) to a
//! playable URI. The resolver owns caching and coalescing; stores are plain
//! lookups.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Object storage lookup failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No object at the path
    #[error("object not found: {0}")]
    NotFound(String),

    /// Transport or server failure
    #[error("storage transport failure: {0}")]
    Transport(String),
}

/// Object storage addressed by path
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Playable URI for the object at `path`
    async fn download_url(&self, path: &str) -> Result<String, StoreError>;
}

/// HTTP object storage
///
/// The object URL is `{base_url}/{path}`. A HEAD request confirms the object
/// exists before the URL is handed out.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// URL of the object at `path`
    pub fn object_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl AssetStore for HttpObjectStore {
    async fn download_url(&self, path: &str) -> Result<String, StoreError> {
        let url = self.object_url(path);
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(StoreError::Transport(format!("HTTP {} for {}", status, url)));
        }

        debug!(path = %path, url = %url, "Object located");
        Ok(url)
    }
}

/// In-memory object storage
///
/// Serves a fixed path → URI table, optionally after a simulated latency.
/// Counts lookups so callers can verify caching behavior.
#[derive(Debug, Default)]
pub struct StaticAssetStore {
    objects: HashMap<String, String>,
    latency: Duration,
    lookups: AtomicU64,
}

impl StaticAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object
    pub fn with_object(mut self, path: impl Into<String>, uri: impl Into<String>) -> Self {
        self.objects.insert(path.into(), uri.into());
        self
    }

    /// Delay every lookup by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of lookups served (hits and misses)
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AssetStore for StaticAssetStore {
    async fn download_url(&self, path: &str) -> Result<String, StoreError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.objects
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }
}
