//! Segment duration measurement
//!
//! - [`DurationCache`]: first-writer-wins identifier → seconds map
//! - [`DurationProber`]: one-shot handle probe
//! - [`DurationService`]: cache-then-probe lookup and whole-sequence totals
//!
//! Sequence totals are computed from concurrent per-segment lookups. A failed
//! lookup contributes 0 and is reported, it never blocks the others. The sum
//! is taken in segment order once every lookup has settled, so completion
//! order cannot change the total.

pub mod cache;
pub mod prober;

pub use cache::DurationCache;
pub use prober::DurationProber;

use crate::error::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Measured duration of one segment of a sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentDuration {
    pub index: usize,
    pub id: String,
    /// Seconds; 0 when the lookup failed
    pub duration: f64,
    /// Failure reason for a degraded (zeroed) entry
    pub error: Option<String>,
}

impl SegmentDuration {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-segment durations and their total
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SequenceDurations {
    pub segments: Vec<SegmentDuration>,
    pub total: f64,
}

impl SequenceDurations {
    fn from_segments(segments: Vec<SegmentDuration>) -> Self {
        let total = segments.iter().map(|s| s.duration).sum();
        Self { segments, total }
    }

    /// Duration of the segment at `index` (0 if out of range)
    pub fn duration_of(&self, index: usize) -> f64 {
        self.segments.get(index).map(|s| s.duration).unwrap_or(0.0)
    }

    /// Entries whose lookup failed
    pub fn degraded(&self) -> impl Iterator<Item = &SegmentDuration> {
        self.segments.iter().filter(|s| s.is_degraded())
    }
}

/// Progress of a sequence calculation, reported after each settlement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationProgress {
    pub settled: usize,
    pub total: usize,
}

impl DurationProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.settled as f64 / self.total as f64 * 100.0
        }
    }
}

/// Cache-then-probe duration lookups
#[derive(Clone)]
pub struct DurationService {
    cache: Arc<DurationCache>,
    prober: Arc<DurationProber>,
}

impl DurationService {
    pub fn new(cache: Arc<DurationCache>, prober: Arc<DurationProber>) -> Self {
        Self { cache, prober }
    }

    pub fn cache(&self) -> &Arc<DurationCache> {
        &self.cache
    }

    /// Duration of `id`, probing on a cache miss
    pub async fn measure(&self, id: &str) -> Result<f64> {
        if let Some(duration) = self.cache.get(id).await {
            debug!(segment_id = %id, duration_s = duration, "Duration cache hit");
            return Ok(duration);
        }

        let measured = self.prober.probe(id).await?;
        self.cache.set(id, measured).await;
        // A concurrent probe may have stored first; serve the cached value
        Ok(self.cache.get(id).await.unwrap_or(measured))
    }

    /// Durations of every segment in `ids` and their total
    pub async fn calculate_sequence_duration(&self, ids: &[String]) -> SequenceDurations {
        self.calculate_with_progress(ids, |_| {}).await
    }

    /// Same as [`calculate_sequence_duration`](Self::calculate_sequence_duration),
    /// calling `on_progress` after each lookup settles
    pub async fn calculate_with_progress<F>(&self, ids: &[String], mut on_progress: F) -> SequenceDurations
    where
        F: FnMut(DurationProgress),
    {
        let total = ids.len();
        let mut slots: Vec<Option<SegmentDuration>> = vec![None; total];

        let mut pending: FuturesUnordered<_> = ids
            .iter()
            .enumerate()
            .map(|(index, id)| async move { (index, self.measure(id).await) })
            .collect();

        let mut settled = 0;
        while let Some((index, outcome)) = pending.next().await {
            let id = ids[index].clone();
            let entry = match outcome {
                Ok(duration) => SegmentDuration {
                    index,
                    id,
                    duration,
                    error: None,
                },
                Err(e) => {
                    warn!(segment_id = %id, index, "Duration unavailable, counting as 0: {}", e);
                    SegmentDuration {
                        index,
                        id,
                        duration: 0.0,
                        error: Some(e.to_string()),
                    }
                }
            };
            slots[index] = Some(entry);
            settled += 1;
            on_progress(DurationProgress { settled, total });
        }

        let segments = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| SegmentDuration {
                    index,
                    id: ids[index].clone(),
                    duration: 0.0,
                    error: Some("lookup did not settle".to_string()),
                })
            })
            .collect();

        let durations = SequenceDurations::from_segments(segments);
        info!(
            segments = total,
            degraded = durations.degraded().count(),
            total_s = durations.total,
            "Calculated sequence duration"
        );
        durations
    }
}
