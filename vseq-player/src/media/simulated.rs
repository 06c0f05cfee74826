//! Simulated media backend
//!
//! Timer-driven playback handles with a configurable duration per URI. Each
//! handle runs a small tokio task that loads for `load_latency`, reports
//! `Ready`, then advances its position every `tick` while playing. Used by
//! the CLI when no real media layer is attached.

use super::{EventSink, HandleEvent, HandleId, MediaBackend, PlaybackHandle};
use crate::error::{Error, Result};
use crate::resolver::ResolvedSource;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Backend producing [`SimulatedHandle`]s
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    durations: HashMap<String, f64>,
    failures: HashSet<String>,
    default_duration: Option<f64>,
    load_latency: Duration,
    tick: Duration,
}

impl SimulatedBackend {
    /// Create a backend reporting time updates every `tick`
    pub fn new(tick: Duration) -> Self {
        Self {
            durations: HashMap::new(),
            failures: HashSet::new(),
            default_duration: None,
            load_latency: Duration::from_millis(50),
            tick,
        }
    }

    /// Content duration for a URI
    pub fn with_duration(mut self, uri: impl Into<String>, seconds: f64) -> Self {
        self.durations.insert(uri.into(), seconds);
        self
    }

    /// Duration used for URIs without an explicit entry
    pub fn with_default_duration(mut self, seconds: f64) -> Self {
        self.default_duration = Some(seconds);
        self
    }

    /// Make loading of a URI fail
    pub fn with_failure(mut self, uri: impl Into<String>) -> Self {
        self.failures.insert(uri.into());
        self
    }

    pub fn with_load_latency(mut self, latency: Duration) -> Self {
        self.load_latency = latency;
        self
    }
}

impl MediaBackend for SimulatedBackend {
    fn create(&self, source: &ResolvedSource, sink: EventSink) -> Result<Box<dyn PlaybackHandle>> {
        let outcome = if self.failures.contains(&source.uri) {
            LoadOutcome::Fail(format!("failed to load {}", source.uri))
        } else {
            match self.durations.get(&source.uri).copied().or(self.default_duration) {
                Some(duration) if duration.is_finite() && duration >= 0.0 => {
                    LoadOutcome::Loaded(duration)
                }
                Some(duration) => {
                    return Err(Error::InvalidRequest(format!(
                        "invalid simulated duration {} for {}",
                        duration, source.uri
                    )))
                }
                None => LoadOutcome::Fail(format!("no media at {}", source.uri)),
            }
        };

        let id = sink.handle_id();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SimStatus::default());

        tokio::spawn(drive(
            outcome,
            self.load_latency,
            self.tick,
            sink,
            control_rx,
            status_tx,
        ));

        debug!(handle = %id, uri = %source.uri, "Created simulated handle");
        Ok(Box::new(SimulatedHandle {
            id,
            control_tx,
            status_rx,
        }))
    }
}

#[derive(Debug, Clone)]
enum LoadOutcome {
    Loaded(f64),
    Fail(String),
}

#[derive(Debug)]
enum Control {
    Play,
    Pause,
    Seek(f64),
    Rate(f64),
    Release,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimStatus {
    duration: Option<f64>,
    position: f64,
}

/// Handle controlled through a channel to its driver task
#[derive(Debug)]
pub struct SimulatedHandle {
    id: HandleId,
    control_tx: mpsc::UnboundedSender<Control>,
    status_rx: watch::Receiver<SimStatus>,
}

impl SimulatedHandle {
    fn send(&self, control: Control) {
        // Driver gone means the handle already finished or was released
        let _ = self.control_tx.send(control);
    }
}

impl PlaybackHandle for SimulatedHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn play(&mut self) {
        self.send(Control::Play);
    }

    fn pause(&mut self) {
        self.send(Control::Pause);
    }

    fn seek(&mut self, position: f64) {
        self.send(Control::Seek(position));
    }

    fn set_muted(&mut self, _muted: bool) {
        // No audio is rendered
    }

    fn set_rate(&mut self, rate: f64) {
        self.send(Control::Rate(rate));
    }

    fn duration(&self) -> Option<f64> {
        self.status_rx.borrow().duration
    }

    fn current_time(&self) -> f64 {
        self.status_rx.borrow().position
    }

    fn release(&mut self) {
        self.send(Control::Release);
    }
}

async fn drive(
    outcome: LoadOutcome,
    load_latency: Duration,
    tick: Duration,
    sink: EventSink,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
    status_tx: watch::Sender<SimStatus>,
) {
    let load_deadline = Instant::now() + load_latency;
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut loaded: Option<f64> = None;
    let mut failed = false;
    let mut playing = false;
    let mut position = 0.0_f64;
    let mut rate = 1.0_f64;

    loop {
        tokio::select! {
            control = control_rx.recv() => {
                let Some(control) = control else { break };
                match control {
                    Control::Release => break,
                    Control::Play => {
                        let at_end = loaded.map(|d| position >= d).unwrap_or(false);
                        if !playing && !at_end && !failed {
                            playing = true;
                            if loaded.is_some() {
                                ticker.reset();
                                sink.emit(HandleEvent::PlayingChanged(true));
                            }
                        }
                    }
                    Control::Pause => {
                        if playing {
                            playing = false;
                            if loaded.is_some() {
                                sink.emit(HandleEvent::PlayingChanged(false));
                            }
                        }
                    }
                    Control::Seek(target) => {
                        if let Some(duration) = loaded {
                            position = target.clamp(0.0, duration);
                            sink.emit(HandleEvent::TimeUpdate(position));
                        }
                    }
                    Control::Rate(new_rate) => {
                        if new_rate.is_finite() && new_rate > 0.0 {
                            rate = new_rate;
                        }
                    }
                }
            }
            _ = sleep_until(load_deadline), if loaded.is_none() && !failed => {
                match &outcome {
                    LoadOutcome::Loaded(duration) => {
                        loaded = Some(*duration);
                        sink.emit(HandleEvent::Ready { duration: *duration });
                        if playing {
                            ticker.reset();
                            sink.emit(HandleEvent::PlayingChanged(true));
                        }
                    }
                    LoadOutcome::Fail(message) => {
                        failed = true;
                        playing = false;
                        sink.emit(HandleEvent::Error(message.clone()));
                    }
                }
            }
            _ = ticker.tick(), if playing && loaded.is_some() => {
                let duration = loaded.unwrap_or_default();
                position += tick.as_secs_f64() * rate;
                if position >= duration {
                    position = duration;
                    playing = false;
                    sink.emit(HandleEvent::TimeUpdate(position));
                    sink.emit(HandleEvent::PlayingChanged(false));
                    sink.emit(HandleEvent::EndOfContent);
                } else {
                    sink.emit(HandleEvent::TimeUpdate(position));
                }
            }
        }

        status_tx.send_replace(SimStatus {
            duration: loaded,
            position,
        });

        if sink.is_closed() {
            break;
        }
    }

    trace!(handle = %sink.handle_id(), "Simulated handle driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::HandleMessage;

    fn source(uri: &str) -> ResolvedSource {
        ResolvedSource {
            uri: uri.to_string(),
            metadata: None,
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<HandleMessage>) -> HandleEvent {
        rx.recv().await.unwrap().event
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_ready_then_plays_to_end() {
        let backend = SimulatedBackend::new(Duration::from_millis(500))
            .with_duration("mem://a", 1.0);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = backend
            .create(&source("mem://a"), EventSink::new(HandleId::next(), tx))
            .unwrap();

        assert_eq!(next_event(&mut rx).await, HandleEvent::Ready { duration: 1.0 });

        handle.play();
        assert_eq!(next_event(&mut rx).await, HandleEvent::PlayingChanged(true));
        assert_eq!(next_event(&mut rx).await, HandleEvent::TimeUpdate(0.5));
        assert_eq!(next_event(&mut rx).await, HandleEvent::TimeUpdate(1.0));
        assert_eq!(next_event(&mut rx).await, HandleEvent::PlayingChanged(false));
        assert_eq!(next_event(&mut rx).await, HandleEvent::EndOfContent);

        handle.release();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reports_error() {
        let backend = SimulatedBackend::new(Duration::from_millis(500)).with_failure("mem://bad");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = backend
            .create(&source("mem://bad"), EventSink::new(HandleId::next(), tx))
            .unwrap();

        assert!(matches!(next_event(&mut rx).await, HandleEvent::Error(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_uri_without_default_fails() {
        let backend = SimulatedBackend::new(Duration::from_millis(500));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = backend
            .create(&source("mem://missing"), EventSink::new(HandleId::next(), tx))
            .unwrap();

        assert!(matches!(next_event(&mut rx).await, HandleEvent::Error(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_stops_events() {
        let backend = SimulatedBackend::new(Duration::from_millis(100))
            .with_default_duration(10.0);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = backend
            .create(&source("mem://x"), EventSink::new(HandleId::next(), tx))
            .unwrap();

        assert!(matches!(next_event(&mut rx).await, HandleEvent::Ready { .. }));
        handle.release();

        // Driver exits and drops the sink, closing the channel
        assert!(rx.recv().await.is_none());
    }
}
