//! Manually driven media backend
//!
//! Handles for URIs with a configured duration report `Ready` as soon as
//! they are constructed; configured failures report `Error`. Handles for any
//! other URI stay loading until the test drives them. Every construction and
//! release is counted.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use vseq_player::media::{EventSink, HandleEvent, HandleId, MediaBackend, PlaybackHandle};
use vseq_player::resolver::ResolvedSource;
use vseq_player::Result;

#[derive(Clone, Default)]
pub struct ManualBackend {
    state: Arc<Mutex<BackendState>>,
}

#[derive(Default)]
struct BackendState {
    durations: HashMap<String, f64>,
    failures: HashSet<String>,
    /// Loads fail from this (0-based) construction of the URI onwards
    fail_from: HashMap<String, usize>,
    constructions: HashMap<String, usize>,
    /// Source passed to the most recent construction per URI
    sources: HashMap<String, ResolvedSource>,
    live: BTreeMap<u64, LiveHandle>,
    created: usize,
    released: usize,
    peak_live: usize,
}

struct LiveHandle {
    uri: String,
    sink: EventSink,
    duration: Option<f64>,
    position: f64,
    playing: bool,
    muted: bool,
    rate: f64,
    plays: usize,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(self, uri: impl Into<String>, seconds: f64) -> Self {
        self.lock().durations.insert(uri.into(), seconds);
        self
    }

    pub fn with_failure(self, uri: impl Into<String>) -> Self {
        self.lock().failures.insert(uri.into());
        self
    }

    /// Let the first `ok_loads` constructions of `uri` load, fail the rest
    pub fn with_failure_after(self, uri: impl Into<String>, ok_loads: usize) -> Self {
        self.lock().fail_from.insert(uri.into(), ok_loads);
        self
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    // ----- accounting -----

    pub fn created(&self) -> usize {
        self.lock().created
    }

    pub fn released(&self) -> usize {
        self.lock().released
    }

    pub fn live(&self) -> usize {
        self.lock().live.len()
    }

    pub fn peak_live(&self) -> usize {
        self.lock().peak_live
    }

    /// Restart peak tracking from the current live count
    pub fn reset_peak(&self) {
        let mut state = self.lock();
        state.peak_live = state.live.len();
    }

    pub fn constructions_of(&self, uri: &str) -> usize {
        self.lock().constructions.get(uri).copied().unwrap_or(0)
    }

    pub fn last_source(&self, uri: &str) -> Option<ResolvedSource> {
        self.lock().sources.get(uri).cloned()
    }

    pub fn live_of(&self, uri: &str) -> usize {
        self.lock().live.values().filter(|h| h.uri == uri).count()
    }

    pub fn is_playing(&self, uri: &str) -> bool {
        self.with_latest(uri, |h| h.playing).unwrap_or(false)
    }

    pub fn is_muted(&self, uri: &str) -> Option<bool> {
        self.with_latest(uri, |h| h.muted)
    }

    pub fn rate(&self, uri: &str) -> Option<f64> {
        self.with_latest(uri, |h| h.rate)
    }

    pub fn plays(&self, uri: &str) -> usize {
        self.with_latest(uri, |h| h.plays).unwrap_or(0)
    }

    // ----- driving -----

    /// Report `Ready` for the latest live handle of `uri`
    pub fn ready(&self, uri: &str, duration: f64) -> bool {
        self.with_latest(uri, |h| {
            h.duration = Some(duration);
            h.sink.emit(HandleEvent::Ready { duration })
        })
        .unwrap_or(false)
    }

    pub fn time_update(&self, uri: &str, position: f64) -> bool {
        self.with_latest(uri, |h| {
            h.position = position;
            h.sink.emit(HandleEvent::TimeUpdate(position))
        })
        .unwrap_or(false)
    }

    /// Play the latest handle of `uri` to its end
    pub fn finish(&self, uri: &str) -> bool {
        self.with_latest(uri, |h| {
            let end = h.duration.unwrap_or(h.position);
            h.position = end;
            h.playing = false;
            h.sink.emit(HandleEvent::TimeUpdate(end))
                && h.sink.emit(HandleEvent::PlayingChanged(false))
                && h.sink.emit(HandleEvent::EndOfContent)
        })
        .unwrap_or(false)
    }

    pub fn fail(&self, uri: &str, message: &str) -> bool {
        self.with_latest(uri, |h| h.sink.emit(HandleEvent::Error(message.to_string())))
            .unwrap_or(false)
    }

    fn with_latest<T>(&self, uri: &str, f: impl FnOnce(&mut LiveHandle) -> T) -> Option<T> {
        let mut state = self.lock();
        state
            .live
            .values_mut()
            .rev()
            .find(|h| h.uri == uri)
            .map(f)
    }
}

impl MediaBackend for ManualBackend {
    fn create(&self, source: &ResolvedSource, sink: EventSink) -> Result<Box<dyn PlaybackHandle>> {
        let id = sink.handle_id();
        let mut state = self.lock();

        let ordinal = {
            let count = state.constructions.entry(source.uri.clone()).or_insert(0);
            *count += 1;
            *count - 1
        };
        state.created += 1;
        state.sources.insert(source.uri.clone(), source.clone());

        let failing = state.failures.contains(&source.uri)
            || state
                .fail_from
                .get(&source.uri)
                .map_or(false, |&from| ordinal >= from);

        let mut handle = LiveHandle {
            uri: source.uri.clone(),
            sink,
            duration: None,
            position: 0.0,
            playing: false,
            muted: false,
            rate: 1.0,
            plays: 0,
        };

        if failing {
            handle
                .sink
                .emit(HandleEvent::Error(format!("cannot load {}", source.uri)));
        } else if let Some(duration) = state.durations.get(&source.uri).copied() {
            handle.duration = Some(duration);
            handle.sink.emit(HandleEvent::Ready { duration });
        }

        state.live.insert(id.0, handle);
        state.peak_live = state.peak_live.max(state.live.len());

        Ok(Box::new(ManualHandle {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

struct ManualHandle {
    id: HandleId,
    state: Arc<Mutex<BackendState>>,
}

impl ManualHandle {
    fn update<T: Default>(&self, f: impl FnOnce(&mut LiveHandle) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        state.live.get_mut(&self.id.0).map(f).unwrap_or_default()
    }
}

impl PlaybackHandle for ManualHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn play(&mut self) {
        self.update(|h| {
            if !h.playing {
                h.playing = true;
                h.plays += 1;
                h.sink.emit(HandleEvent::PlayingChanged(true));
            }
        })
    }

    fn pause(&mut self) {
        self.update(|h| {
            if h.playing {
                h.playing = false;
                h.sink.emit(HandleEvent::PlayingChanged(false));
            }
        })
    }

    fn seek(&mut self, position: f64) {
        self.update(|h| h.position = position)
    }

    fn set_muted(&mut self, muted: bool) {
        self.update(|h| h.muted = muted)
    }

    fn set_rate(&mut self, rate: f64) {
        self.update(|h| h.rate = rate)
    }

    fn duration(&self) -> Option<f64> {
        self.update(|h| h.duration)
    }

    fn current_time(&self) -> f64 {
        self.update(|h| h.position)
    }

    fn release(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.live.remove(&self.id.0).is_some() {
            state.released += 1;
        }
    }
}
