//! Duration cache
//!
//! Segment identifier → measured duration (seconds). The first write for an
//! identifier wins; later writes are ignored, so a late probe result cannot
//! replace a value that has already been served.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct DurationCache {
    entries: RwLock<HashMap<String, f64>>,
}

impl DurationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached duration for `id`
    pub async fn get(&self, id: &str) -> Option<f64> {
        self.entries.read().await.get(id).copied()
    }

    /// Record a duration
    ///
    /// Returns true if the value was stored, false if an entry already
    /// existed or the value is not a valid duration.
    pub async fn set(&self, id: &str, duration: f64) -> bool {
        if !duration.is_finite() || duration < 0.0 {
            warn!(segment_id = %id, duration, "Ignoring invalid duration");
            return false;
        }

        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(id) {
            if *existing != duration {
                debug!(
                    segment_id = %id,
                    existing = *existing,
                    ignored = duration,
                    "Duration already cached, keeping first value"
                );
            }
            return false;
        }
        entries.insert(id.to_string(), duration);
        true
    }

    /// Number of cached entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every entry (session reset)
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
