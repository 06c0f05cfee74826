//! Player context
//!
//! Explicitly constructed owner of the shared caches and collaborators.
//! Every sequence mounted from one context shares its asset URL cache and
//! duration cache; separate contexts share nothing.

use crate::config::PlayerConfig;
use crate::duration::{DurationCache, DurationProber, DurationService, SequenceDurations};
use crate::error::Result;
use crate::media::MediaBackend;
use crate::playback::controller::{self, Collaborators};
use crate::playback::SequenceHandle;
use crate::resolver::{AssetResolver, AssetStore};
use crate::segment::Segment;
use std::sync::Arc;
use vseq_common::events::EventBus;

const EVENT_BUS_CAPACITY: usize = 256;

pub struct PlayerContext {
    config: Arc<PlayerConfig>,
    resolver: Arc<AssetResolver>,
    durations: DurationService,
    backend: Arc<dyn MediaBackend>,
    event_bus: EventBus,
}

impl PlayerContext {
    pub fn new(
        config: PlayerConfig,
        store: Arc<dyn AssetStore>,
        backend: Arc<dyn MediaBackend>,
    ) -> Self {
        let resolver = Arc::new(AssetResolver::new(store, &config));
        let prober = Arc::new(DurationProber::new(
            Arc::clone(&resolver),
            Arc::clone(&backend),
            &config,
        ));
        let durations = DurationService::new(Arc::new(DurationCache::new()), prober);

        Self {
            config: Arc::new(config),
            resolver,
            durations,
            backend,
            event_bus: EventBus::new(EVENT_BUS_CAPACITY),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<AssetResolver> {
        &self.resolver
    }

    pub fn durations(&self) -> &DurationService {
        &self.durations
    }

    pub fn duration_cache(&self) -> &Arc<DurationCache> {
        self.durations.cache()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Per-segment durations and total for `ids` without mounting
    pub async fn calculate_sequence_duration(&self, ids: &[String]) -> SequenceDurations {
        self.durations.calculate_sequence_duration(ids).await
    }

    /// Mount `segments` and start the pre-flight duration calculation
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns `InvalidRequest` for an empty segment list.
    pub fn mount(&self, segments: Vec<Segment>) -> Result<SequenceHandle> {
        controller::mount(
            Collaborators {
                config: Arc::clone(&self.config),
                resolver: Arc::clone(&self.resolver),
                durations: self.durations.clone(),
                backend: Arc::clone(&self.backend),
                event_bus: self.event_bus.clone(),
            },
            segments,
        )
    }

    /// Drop cached asset URLs and measured durations
    pub async fn clear_caches(&self) {
        self.resolver.clear_cache().await;
        self.durations.cache().clear().await;
    }
}
