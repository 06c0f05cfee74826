//! Player context fixture and wait helpers

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use vseq_common::events::SequenceEvent;
use vseq_player::resolver::StaticAssetStore;
use vseq_player::{PlayerConfig, PlayerContext, Segment, SequenceHandle, SequenceSnapshot};

use super::ManualBackend;

/// Virtual time allowed for any single wait (tests run with paused time)
const WAIT_LIMIT: Duration = Duration::from_secs(60);

/// Playable URI the in-memory store serves for `id`
pub fn uri(id: &str) -> String {
    format!("mem://{}", id)
}

pub fn segments(ids: &[&str]) -> Vec<Segment> {
    ids.iter()
        .map(|id| Segment::new(*id, format!("Segment {}", id)))
        .collect()
}

pub struct Fixture {
    pub context: PlayerContext,
    pub backend: ManualBackend,
    pub store: Arc<StaticAssetStore>,
}

impl Fixture {
    /// Context whose store serves every id in `known`, backed by `backend`
    pub fn with_backend(known: &[&str], backend: ManualBackend, config: PlayerConfig) -> Self {
        let mut store = StaticAssetStore::new();
        for id in known {
            store = store.with_object(config.asset_path(id), uri(id));
        }
        let store = Arc::new(store);

        let context = PlayerContext::new(config, store.clone(), Arc::new(backend.clone()));
        Self {
            context,
            backend,
            store,
        }
    }

    /// Every segment resolvable and loading instantly with the given duration
    pub fn new(durations: &[(&str, f64)]) -> Self {
        let mut backend = ManualBackend::new();
        for (id, seconds) in durations {
            backend = backend.with_duration(uri(id), *seconds);
        }
        let ids: Vec<&str> = durations.iter().map(|(id, _)| *id).collect();
        Self::with_backend(&ids, backend, PlayerConfig::default())
    }

    pub fn mount(&self, ids: &[&str]) -> SequenceHandle {
        self.context.mount(segments(ids)).unwrap()
    }
}

/// Wait for a snapshot matching `predicate`, panicking after the wait limit
pub async fn wait_for<F>(handle: &SequenceHandle, predicate: F) -> SequenceSnapshot
where
    F: FnMut(&SequenceSnapshot) -> bool,
{
    match tokio::time::timeout(WAIT_LIMIT, handle.wait_for(predicate)).await {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => panic!("controller stopped while waiting: {}", e),
        Err(_) => panic!("timed out waiting; last snapshot: {:?}", handle.snapshot()),
    }
}

/// Poll `condition` until it holds, panicking after the wait limit
pub async fn eventually<F>(mut condition: F, what: &str)
where
    F: FnMut() -> bool,
{
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    };
    if tokio::time::timeout(WAIT_LIMIT, poll).await.is_err() {
        panic!("timed out waiting for {}", what);
    }
}

/// Let every runnable task make progress
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Events received so far
pub fn drain_events(rx: &mut broadcast::Receiver<SequenceEvent>) -> Vec<SequenceEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
