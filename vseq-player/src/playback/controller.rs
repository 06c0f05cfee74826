//! Sequence controller
//!
//! **Responsibilities:**
//! - Pre-flight duration calculation for every segment of the sequence
//! - Ownership of the active and preload playback handles
//! - Handle swap at segment boundaries
//! - Progress accounting and snapshot publication
//!
//! The controller is a single task that owns all mutable sequence state.
//! Commands from [`SequenceHandle`], settlements of spawned work and media
//! handle events are processed one at a time from its `select!` loop, so no
//! two steps ever interleave.
//!
//! Spawned work (duration calculation, resolutions, the transition delay) is
//! tagged with the mount generation. Teardown, replacement, failure and
//! completion bump the generation; settlements carrying an older generation
//! are discarded.
//!
//! The swap window is the `Transitioning` stage itself: it owns the incoming
//! handle, and the near-end trigger only fires from `Playing`, so a second
//! swap cannot start while one is pending.

use super::handle::SequenceHandle;
use super::queue::SegmentQueue;
use super::state::{SequenceProgress, SequenceSnapshot};
use crate::config::PlayerConfig;
use crate::duration::{DurationService, SequenceDurations};
use crate::error::{Error, Result};
use crate::media::{
    EventSink, HandleEvent, HandleId, HandleMessage, MediaBackend, OwnedHandle,
};
use crate::resolver::{AssetResolver, ResolvedSource, SourceMetadata};
use crate::segment::Segment;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;
use vseq_common::events::{EventBus, PlaybackState, SequenceEvent, SequencePhase};

const COMMAND_CHANNEL_CAPACITY: usize = 32;

pub(crate) type Reply = oneshot::Sender<Result<()>>;

/// Requests from a [`SequenceHandle`]
pub(crate) enum Command {
    Play(Reply),
    Pause(Reply),
    TogglePlayPause(Reply),
    Seek(f64, Reply),
    SetMuted(bool, Reply),
    ToggleMute(Reply),
    SetRate(f64, Reply),
    Replace(Vec<Segment>, Reply),
    Unmount(Reply),
}

/// Settlements of work spawned by the controller
enum Internal {
    DurationProgress {
        generation: u64,
        settled: usize,
        total: usize,
    },
    DurationsComplete {
        generation: u64,
        durations: SequenceDurations,
    },
    Resolved {
        generation: u64,
        index: usize,
        role: Role,
        result: Result<ResolvedSource>,
    },
    TransitionDue {
        generation: u64,
    },
}

impl Internal {
    fn generation(&self) -> u64 {
        match self {
            Internal::DurationProgress { generation, .. }
            | Internal::DurationsComplete { generation, .. }
            | Internal::Resolved { generation, .. }
            | Internal::TransitionDue { generation } => *generation,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Internal::DurationProgress { .. } => "duration progress",
            Internal::DurationsComplete { .. } => "duration calculation",
            Internal::Resolved { .. } => "resolution",
            Internal::TransitionDue { .. } => "transition delay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Active,
    Preload,
}

/// A constructed playback handle bound to one segment
struct Slot {
    index: usize,
    handle: OwnedHandle,
    ready: bool,
    playing: bool,
    ended: bool,
    /// Duration reported by the handle's ready event
    duration: Option<f64>,
    /// Last reported position
    position: f64,
}

impl Slot {
    fn new(index: usize, handle: OwnedHandle) -> Self {
        Self {
            index,
            handle,
            ready: false,
            playing: false,
            ended: false,
            duration: None,
            position: 0.0,
        }
    }

    /// Content end as known to the handle, falling back to the measured value
    fn end(&self, measured: f64) -> f64 {
        self.duration
            .or_else(|| self.handle.duration())
            .unwrap_or(measured)
    }
}

enum PreloadSlot {
    Empty,
    Resolving { index: usize },
    Constructed(Slot),
}

impl PreloadSlot {
    fn handle_id(&self) -> Option<HandleId> {
        match self {
            PreloadSlot::Constructed(slot) => Some(slot.handle.id()),
            _ => None,
        }
    }

    fn is_ready(&self) -> bool {
        matches!(self, PreloadSlot::Constructed(slot) if slot.ready)
    }
}

/// Controller lifecycle
enum Stage {
    Initializing,
    CalculatingDurations,
    PreparingFirstSegment,
    Ready,
    Playing,
    Paused,
    /// Incoming handle started, swap pending until the transition delay fires
    Transitioning { incoming: Slot, resume: bool },
    Completed,
    Error(String),
}

impl Stage {
    fn phase(&self) -> SequencePhase {
        match self {
            Stage::Initializing => SequencePhase::Initializing,
            Stage::CalculatingDurations => SequencePhase::CalculatingDurations,
            Stage::PreparingFirstSegment => SequencePhase::PreparingFirstSegment,
            Stage::Ready => SequencePhase::Ready,
            Stage::Playing => SequencePhase::Playing,
            Stage::Paused => SequencePhase::Paused,
            Stage::Transitioning { .. } => SequencePhase::Transitioning,
            Stage::Completed => SequencePhase::Completed,
            Stage::Error(_) => SequencePhase::Error,
        }
    }
}

/// Shared collaborators a controller is built from
#[derive(Clone)]
pub(crate) struct Collaborators {
    pub config: Arc<PlayerConfig>,
    pub resolver: Arc<AssetResolver>,
    pub durations: DurationService,
    pub backend: Arc<dyn MediaBackend>,
    pub event_bus: EventBus,
}

pub(crate) struct SequenceController {
    config: Arc<PlayerConfig>,
    resolver: Arc<AssetResolver>,
    durations: DurationService,
    backend: Arc<dyn MediaBackend>,
    event_bus: EventBus,

    session_id: Uuid,
    generation: u64,
    queue: SegmentQueue,
    /// Measured duration per segment (0 for degraded lookups)
    measured: SequenceDurations,
    durations_settled: usize,
    progress: SequenceProgress,
    stage: Stage,
    active: Option<Slot>,
    preload: PreloadSlot,
    /// Active segment ended before its successor was ready
    pending_advance: bool,
    is_playing: bool,
    muted: bool,
    rate: f64,

    tasks: JoinSet<()>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    handle_tx: mpsc::UnboundedSender<HandleMessage>,
    snapshot_tx: watch::Sender<SequenceSnapshot>,
}

/// Spawn a controller for `segments` and return its handle
///
/// # Errors
/// Returns `InvalidRequest` for an empty segment list.
pub(crate) fn mount(parts: Collaborators, segments: Vec<Segment>) -> Result<SequenceHandle> {
    let queue = SegmentQueue::new(segments)?;
    let session_id = Uuid::new_v4();

    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();
    let (handle_tx, handle_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(SequenceSnapshot::initial(
        session_id,
        queue.len(),
        parts.config.muted,
        parts.config.playback_rate,
    ));

    let event_bus = parts.event_bus.clone();
    let controller = SequenceController {
        muted: parts.config.muted,
        rate: parts.config.playback_rate,
        config: parts.config,
        resolver: parts.resolver,
        durations: parts.durations,
        backend: parts.backend,
        event_bus: parts.event_bus,
        session_id,
        generation: 0,
        measured: SequenceDurations::default(),
        durations_settled: 0,
        progress: SequenceProgress::default(),
        stage: Stage::Initializing,
        active: None,
        preload: PreloadSlot::Empty,
        pending_advance: false,
        is_playing: false,
        queue,
        tasks: JoinSet::new(),
        internal_tx,
        handle_tx,
        snapshot_tx,
    };

    info!(
        session_id = %session_id,
        segments = controller.queue.len(),
        "Mounting sequence"
    );
    tokio::spawn(controller.run(command_rx, internal_rx, handle_rx));

    Ok(SequenceHandle::new(command_tx, snapshot_rx, event_bus))
}

impl SequenceController {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
        mut handle_rx: mpsc::UnboundedReceiver<HandleMessage>,
    ) {
        self.start_preflight();
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Unmount(reply)) => {
                        self.teardown().await;
                        self.publish();
                        info!(session_id = %self.session_id, "Sequence unmounted");
                        let _ = reply.send(Ok(()));
                        break;
                    }
                    Some(command) => {
                        let (reply, result) = self.handle_command(command).await;
                        self.publish();
                        let _ = reply.send(result);
                    }
                    None => {
                        debug!(session_id = %self.session_id, "Sequence handle dropped, tearing down");
                        self.teardown().await;
                        self.publish();
                        break;
                    }
                },
                Some(message) = internal_rx.recv() => self.handle_internal(message),
                Some(message) = handle_rx.recv() => self.handle_media_event(message),
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(session_id = %self.session_id, "Sequence task panicked: {}", e);
                        }
                    }
                }
            }
            self.publish();
        }
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) -> (Reply, Result<()>) {
        match command {
            Command::Play(reply) => (reply, self.play()),
            Command::Pause(reply) => (reply, self.pause()),
            Command::TogglePlayPause(reply) => {
                let playing = matches!(
                    self.stage,
                    Stage::Playing | Stage::Transitioning { resume: true, .. }
                );
                let result = if playing { self.pause() } else { self.play() };
                (reply, result)
            }
            Command::Seek(target, reply) => (reply, self.seek(target)),
            Command::SetMuted(muted, reply) => {
                self.set_muted(muted);
                (reply, Ok(()))
            }
            Command::ToggleMute(reply) => {
                self.set_muted(!self.muted);
                (reply, Ok(()))
            }
            Command::SetRate(rate, reply) => (reply, self.set_rate(rate)),
            Command::Replace(segments, reply) => (reply, self.replace(segments).await),
            // Handled by the run loop
            Command::Unmount(reply) => (reply, Ok(())),
        }
    }

    fn unavailable(&self, operation: &str) -> Error {
        Error::InvalidState(format!(
            "cannot {} while {}",
            operation,
            self.stage.phase()
        ))
    }

    fn play(&mut self) -> Result<()> {
        match self.stage {
            Stage::Ready | Stage::Paused => {
                self.start_playing();
                Ok(())
            }
            Stage::Playing => Ok(()),
            Stage::Transitioning {
                ref mut incoming,
                ref mut resume,
            } => {
                if !*resume {
                    *resume = true;
                    incoming.handle.play();
                }
                Ok(())
            }
            _ => Err(self.unavailable("play")),
        }
    }

    fn start_playing(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let measured = self.measured.duration_of(active.index);
        let at_end = active.ended || (active.ready && active.position >= active.end(measured));

        self.enter(Stage::Playing);
        if at_end {
            // Paused on the final frame; move on instead of replaying nothing
            self.advance_or_complete();
        } else if let Some(active) = self.active.as_mut() {
            active.handle.play();
        }
    }

    fn pause(&mut self) -> Result<()> {
        match self.stage {
            Stage::Playing => {
                if let Some(active) = self.active.as_mut() {
                    active.handle.pause();
                }
                self.enter(Stage::Paused);
                Ok(())
            }
            Stage::Ready | Stage::Paused => Ok(()),
            Stage::Transitioning {
                ref mut incoming,
                ref mut resume,
            } => {
                if *resume {
                    *resume = false;
                    incoming.handle.pause();
                }
                Ok(())
            }
            _ => Err(self.unavailable("pause")),
        }
    }

    fn seek(&mut self, target: f64) -> Result<()> {
        if !target.is_finite() {
            return Err(Error::InvalidRequest(format!(
                "seek target must be finite, got {}",
                target
            )));
        }
        if !matches!(self.stage, Stage::Ready | Stage::Playing | Stage::Paused) {
            return Err(self.unavailable("seek"));
        }
        let Some(active) = self.active.as_mut() else {
            return Err(self.unavailable("seek"));
        };

        let measured = self.measured.duration_of(active.index);
        let end = active.end(measured).max(0.0);
        let position = target.clamp(0.0, end);
        active.handle.seek(position);
        active.position = position;
        if position < end {
            // Back inside the segment: an advance queued at its end no longer applies
            active.ended = false;
            self.pending_advance = false;
            if matches!(self.stage, Stage::Playing) && !active.playing {
                active.handle.play();
            }
        }
        self.progress.set_elapsed(position, measured);
        debug!(
            session_id = %self.session_id,
            index = active.index,
            requested = target,
            position,
            "Seek within active segment"
        );

        self.check_near_end();
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        match self.stage {
            Stage::Transitioning {
                ref mut incoming, ..
            } => incoming.handle.set_muted(muted),
            _ => {
                if let Some(active) = self.active.as_mut() {
                    active.handle.set_muted(muted);
                }
            }
        }
        debug!(session_id = %self.session_id, muted, "Mute preference changed");
    }

    fn set_rate(&mut self, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::InvalidRequest(format!(
                "playback rate must be positive, got {}",
                rate
            )));
        }

        self.rate = rate;
        if let Some(active) = self.active.as_mut() {
            active.handle.set_rate(rate);
        }
        if let Stage::Transitioning { incoming, .. } = &mut self.stage {
            incoming.handle.set_rate(rate);
        }
        debug!(session_id = %self.session_id, rate, "Playback rate changed");
        Ok(())
    }

    async fn replace(&mut self, segments: Vec<Segment>) -> Result<()> {
        let queue = SegmentQueue::new(segments)?;

        self.teardown().await;
        let previous = self.session_id;
        self.session_id = Uuid::new_v4();
        self.queue = queue;
        self.measured = SequenceDurations::default();
        self.durations_settled = 0;
        self.progress = SequenceProgress::default();
        self.stage = Stage::Initializing;
        self.is_playing = false;

        info!(
            previous_session = %previous,
            session_id = %self.session_id,
            segments = self.queue.len(),
            "Replacing sequence"
        );
        self.start_preflight();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Spawned work and settlements
    // ---------------------------------------------------------------------

    fn start_preflight(&mut self) {
        self.enter(Stage::CalculatingDurations);

        let generation = self.generation;
        let durations = self.durations.clone();
        let ids = self.queue.ids();
        let tx = self.internal_tx.clone();

        self.tasks.spawn(async move {
            let progress_tx = tx.clone();
            let durations = durations
                .calculate_with_progress(&ids, |progress| {
                    let _ = progress_tx.send(Internal::DurationProgress {
                        generation,
                        settled: progress.settled,
                        total: progress.total,
                    });
                })
                .await;
            let _ = tx.send(Internal::DurationsComplete {
                generation,
                durations,
            });
        });
    }

    fn spawn_resolve(&mut self, index: usize, role: Role) {
        let Some(segment) = self.queue.get(index) else {
            return;
        };
        let id = segment.id.clone();
        let metadata = SourceMetadata {
            title: Some(segment.title.clone()),
            artist: self.config.metadata_artist.clone(),
        };

        let generation = self.generation;
        let resolver = Arc::clone(&self.resolver);
        let tx = self.internal_tx.clone();
        debug!(segment_id = %id, index, ?role, generation, "Resolving segment source");

        self.tasks.spawn(async move {
            let result = resolver.resolve_with(&id, Some(metadata)).await;
            let _ = tx.send(Internal::Resolved {
                generation,
                index,
                role,
                result,
            });
        });
    }

    fn handle_internal(&mut self, message: Internal) {
        if message.generation() != self.generation {
            warn!(
                session_id = %self.session_id,
                generation = message.generation(),
                current = self.generation,
                "Discarding stale {} result",
                message.kind()
            );
            return;
        }

        match message {
            Internal::DurationProgress { settled, total, .. } => {
                if matches!(self.stage, Stage::CalculatingDurations) {
                    self.durations_settled = settled;
                    self.event_bus.emit_lossy(SequenceEvent::DurationProgress {
                        session_id: self.session_id,
                        settled,
                        total,
                        timestamp: Utc::now(),
                    });
                }
            }
            Internal::DurationsComplete { durations, .. } => self.on_durations(durations),
            Internal::Resolved {
                index,
                role,
                result,
                ..
            } => match role {
                Role::Active => self.on_active_resolved(index, result),
                Role::Preload => self.on_preload_resolved(index, result),
            },
            Internal::TransitionDue { .. } => self.finish_transition(),
        }
    }

    fn on_durations(&mut self, durations: SequenceDurations) {
        if !matches!(self.stage, Stage::CalculatingDurations) {
            return;
        }

        self.durations_settled = self.queue.len();
        self.progress = SequenceProgress::new(durations.total);
        info!(
            session_id = %self.session_id,
            total_s = durations.total,
            degraded = durations.degraded().count(),
            "Sequence duration known"
        );
        self.measured = durations;

        self.enter(Stage::PreparingFirstSegment);
        self.spawn_resolve(0, Role::Active);
        self.start_preload(0);
    }

    fn construct(&self, index: usize, source: &ResolvedSource) -> Result<Slot> {
        let id = HandleId::next();
        let handle = self
            .backend
            .create(source, EventSink::new(id, self.handle_tx.clone()))?;
        debug!(index, handle = %id, uri = %source.uri, "Constructed playback handle");
        Ok(Slot::new(index, OwnedHandle::new(handle)))
    }

    fn on_active_resolved(&mut self, index: usize, result: Result<ResolvedSource>) {
        if !matches!(self.stage, Stage::PreparingFirstSegment) || self.active.is_some() {
            return;
        }

        match result.and_then(|source| self.construct(index, &source)) {
            Ok(mut slot) => {
                slot.handle.set_muted(self.muted);
                slot.handle.set_rate(self.rate);
                self.active = Some(slot);
            }
            Err(e) => self.fail(e),
        }
    }

    /// Begin preparing the first playable segment after `after`
    fn start_preload(&mut self, after: usize) {
        match self.queue.next_candidate(after) {
            Some(index) => {
                self.preload = PreloadSlot::Resolving { index };
                self.spawn_resolve(index, Role::Preload);
            }
            None => {
                self.preload = PreloadSlot::Empty;
                debug!(session_id = %self.session_id, "No further segment to preload");
            }
        }
    }

    fn on_preload_resolved(&mut self, index: usize, result: Result<ResolvedSource>) {
        match self.preload {
            PreloadSlot::Resolving { index: pending } if pending == index => {}
            _ => {
                trace!(index, "Ignoring superseded preload resolution");
                return;
            }
        }

        match result.and_then(|source| self.construct(index, &source)) {
            Ok(mut slot) => {
                slot.handle.set_muted(true);
                slot.handle.set_rate(self.rate);
                self.preload = PreloadSlot::Constructed(slot);
            }
            Err(e) => self.preload_failed(index, e.to_string()),
        }
    }

    fn preload_failed(&mut self, index: usize, reason: String) {
        let segment_id = self
            .queue
            .get(index)
            .map(|s| s.id.clone())
            .unwrap_or_default();
        warn!(
            session_id = %self.session_id,
            segment_id = %segment_id,
            index,
            "Preload failed, segment will be skipped: {}",
            reason
        );

        self.preload = PreloadSlot::Empty;
        self.queue.mark_skipped(index);
        self.event_bus.emit_lossy(SequenceEvent::SegmentSkipped {
            session_id: self.session_id,
            index,
            segment_id,
            reason,
            timestamp: Utc::now(),
        });

        self.start_preload(index);
        if self.pending_advance {
            self.advance_or_complete();
        }
    }

    // ---------------------------------------------------------------------
    // Media handle events
    // ---------------------------------------------------------------------

    fn handle_media_event(&mut self, message: HandleMessage) {
        let HandleMessage { handle, event } = message;

        if self.active.as_ref().map(|s| s.handle.id()) == Some(handle) {
            self.on_active_event(event);
        } else if self.preload.handle_id() == Some(handle) {
            self.on_preload_event(event);
        } else if matches!(&self.stage, Stage::Transitioning { incoming, .. } if incoming.handle.id() == handle)
        {
            self.on_incoming_event(event);
        } else {
            trace!(handle = %handle, ?event, "Ignoring event from released handle");
        }
    }

    fn on_active_event(&mut self, event: HandleEvent) {
        let transitioning = matches!(self.stage, Stage::Transitioning { .. });

        match event {
            HandleEvent::Ready { duration } => {
                let Some(active) = self.active.as_mut() else {
                    return;
                };
                active.ready = true;
                active.duration = Some(duration);
                let index = active.index;

                if matches!(self.stage, Stage::PreparingFirstSegment) {
                    debug!(index, duration_s = duration, "Active segment ready");
                    self.enter(Stage::Ready);
                    self.emit_segment_changed(index);
                    if self.config.autoplay {
                        self.start_playing();
                    }
                }
            }
            HandleEvent::Error(message) => {
                self.fail(Error::Playback(message));
            }
            HandleEvent::TimeUpdate(position) => {
                let Some(active) = self.active.as_mut() else {
                    return;
                };
                active.position = position;
                let measured = self.measured.duration_of(active.index);
                self.progress.set_elapsed(position, measured);
                self.check_near_end();
            }
            HandleEvent::PlayingChanged(playing) => {
                if let Some(active) = self.active.as_mut() {
                    active.playing = playing;
                }
                // The outgoing handle is silent during a swap
                if !transitioning {
                    self.set_playing(playing);
                }
            }
            HandleEvent::EndOfContent => {
                if let Some(active) = self.active.as_mut() {
                    active.ended = true;
                }
                match self.stage {
                    Stage::Ready | Stage::Playing => self.advance_or_complete(),
                    // Finished while paused, continues on the next play
                    _ => {}
                }
            }
        }
    }

    fn on_preload_event(&mut self, event: HandleEvent) {
        let PreloadSlot::Constructed(slot) = &mut self.preload else {
            return;
        };

        match event {
            HandleEvent::Ready { duration } => {
                slot.ready = true;
                slot.duration = Some(duration);
                debug!(index = slot.index, duration_s = duration, "Preload segment ready");

                if self.pending_advance {
                    self.advance_or_complete();
                } else {
                    self.check_near_end();
                }
            }
            HandleEvent::Error(message) => {
                let index = slot.index;
                self.preload_failed(index, message);
            }
            // Muted and not started; nothing else is relevant
            _ => {}
        }
    }

    fn on_incoming_event(&mut self, event: HandleEvent) {
        let Stage::Transitioning { incoming, .. } = &mut self.stage else {
            return;
        };

        match event {
            HandleEvent::TimeUpdate(position) => incoming.position = position,
            HandleEvent::PlayingChanged(playing) => {
                incoming.playing = playing;
                self.set_playing(playing);
            }
            HandleEvent::EndOfContent => incoming.ended = true,
            HandleEvent::Error(message) => self.fail(Error::Playback(message)),
            HandleEvent::Ready { .. } => {}
        }
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    fn check_near_end(&mut self) {
        if !matches!(self.stage, Stage::Playing) || !self.preload.is_ready() {
            return;
        }
        let Some(active) = self.active.as_ref() else {
            return;
        };

        let measured = self.measured.duration_of(active.index);
        let threshold = active.end(measured) - self.config.near_end_epsilon_secs();
        if active.position >= threshold {
            debug!(
                index = active.index,
                position = active.position,
                threshold,
                "Active segment near end"
            );
            self.begin_transition(true);
        }
    }

    /// Move past the finished active segment: swap, wait, or complete
    fn advance_or_complete(&mut self) {
        match &self.preload {
            PreloadSlot::Constructed(slot) if slot.ready => {
                let resume = matches!(self.stage, Stage::Ready | Stage::Playing);
                self.begin_transition(resume);
            }
            PreloadSlot::Resolving { index } | PreloadSlot::Constructed(Slot { index, .. }) => {
                debug!(
                    waiting_for = *index,
                    "Active segment finished before its successor was ready"
                );
                self.pending_advance = true;
            }
            PreloadSlot::Empty => self.complete(),
        }
    }

    fn begin_transition(&mut self, resume: bool) {
        let PreloadSlot::Constructed(mut incoming) =
            std::mem::replace(&mut self.preload, PreloadSlot::Empty)
        else {
            return;
        };
        self.pending_advance = false;

        // Only one handle is audible at a time
        if let Some(outgoing) = self.active.as_mut() {
            outgoing.handle.set_muted(true);
        }
        incoming.handle.set_rate(self.rate);
        incoming.handle.set_muted(self.muted);
        if resume {
            incoming.handle.play();
        }

        info!(
            session_id = %self.session_id,
            from = self.queue.active_index(),
            to = incoming.index,
            "Starting segment transition"
        );

        let generation = self.generation;
        let delay = self.config.transition_delay();
        let tx = self.internal_tx.clone();
        self.tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::TransitionDue { generation });
        });

        self.enter(Stage::Transitioning { incoming, resume });
    }

    fn finish_transition(&mut self) {
        let resume = match self.stage {
            Stage::Transitioning { resume, .. } => resume,
            _ => return,
        };
        let Stage::Transitioning { incoming, .. } =
            self.enter(if resume { Stage::Playing } else { Stage::Paused })
        else {
            return;
        };

        let next_index = incoming.index;
        let playing = incoming.playing;
        let ended = incoming.ended;
        if let Some(mut outgoing) = self.active.replace(incoming) {
            outgoing.handle.release();
        }

        let passed = match self.queue.advance_to(next_index) {
            Ok(passed) => passed,
            Err(e) => {
                self.fail(e);
                return;
            }
        };
        // Skipped segments between the two count as passed
        let passed_duration: f64 = passed
            .map(|i| self.measured.duration_of(i))
            .sum();
        self.progress.advance(next_index, passed_duration);
        self.set_playing(playing);

        info!(
            session_id = %self.session_id,
            index = next_index,
            cumulative_s = self.progress.cumulative_before_active,
            "Segment transition complete"
        );
        self.emit_segment_changed(next_index);
        self.start_preload(next_index);

        if ended && resume {
            self.advance_or_complete();
        }
    }

    fn complete(&mut self) {
        let index = self.queue.active_index();
        let measured = self.measured.duration_of(index);
        self.progress.complete(measured);
        self.pending_advance = false;
        self.generation += 1;
        self.tasks.abort_all();

        self.enter(Stage::Completed);
        self.release_handles();
        self.set_playing(false);

        info!(
            session_id = %self.session_id,
            total_s = self.progress.total_duration,
            "Sequence complete"
        );
        self.event_bus.emit_lossy(SequenceEvent::SequenceCompleted {
            session_id: self.session_id,
            total_duration: self.progress.total_duration,
            timestamp: Utc::now(),
        });
    }

    fn fail(&mut self, err: Error) {
        if matches!(self.stage, Stage::Error(_)) {
            return;
        }

        let message = err.to_string();
        error!(session_id = %self.session_id, "Sequence failed: {}", message);

        self.generation += 1;
        self.tasks.abort_all();
        self.pending_advance = false;
        self.enter(Stage::Error(message.clone()));
        self.release_handles();
        self.set_playing(false);

        self.event_bus.emit_lossy(SequenceEvent::SequenceFailed {
            session_id: self.session_id,
            message,
            timestamp: Utc::now(),
        });
    }

    fn release_handles(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.handle.release();
        }
        if let PreloadSlot::Constructed(mut slot) =
            std::mem::replace(&mut self.preload, PreloadSlot::Empty)
        {
            slot.handle.release();
        }
    }

    /// Cancel spawned work and release every handle
    async fn teardown(&mut self) {
        self.generation += 1;
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}

        if matches!(self.stage, Stage::Transitioning { .. }) {
            if let Stage::Transitioning { mut incoming, .. } =
                std::mem::replace(&mut self.stage, Stage::Paused)
            {
                incoming.handle.release();
            }
        }
        self.release_handles();
        self.pending_advance = false;
        self.set_playing(false);
        debug!(session_id = %self.session_id, generation = self.generation, "Sequence torn down");
    }

    // ---------------------------------------------------------------------
    // State publication
    // ---------------------------------------------------------------------

    /// Switch stage, announcing a phase change. Returns the previous stage.
    fn enter(&mut self, stage: Stage) -> Stage {
        let old_phase = self.stage.phase();
        let previous = std::mem::replace(&mut self.stage, stage);
        let new_phase = self.stage.phase();

        if old_phase != new_phase {
            info!(
                session_id = %self.session_id,
                "Sequence phase: {} -> {}",
                old_phase,
                new_phase
            );
            self.event_bus.emit_lossy(SequenceEvent::PhaseChanged {
                session_id: self.session_id,
                old_phase,
                new_phase,
                timestamp: Utc::now(),
            });
        }
        previous
    }

    fn set_playing(&mut self, playing: bool) {
        if self.is_playing == playing {
            return;
        }
        let state = |p: bool| {
            if p {
                PlaybackState::Playing
            } else {
                PlaybackState::Paused
            }
        };
        self.event_bus.emit_lossy(SequenceEvent::PlaybackStateChanged {
            session_id: self.session_id,
            old_state: state(self.is_playing),
            new_state: state(playing),
            timestamp: Utc::now(),
        });
        self.is_playing = playing;
    }

    fn emit_segment_changed(&self, index: usize) {
        let segment_id = self
            .queue
            .get(index)
            .map(|s| s.id.clone())
            .unwrap_or_default();
        self.event_bus.emit_lossy(SequenceEvent::SegmentChanged {
            session_id: self.session_id,
            index,
            segment_id,
            timestamp: Utc::now(),
        });
    }

    fn live_handles(&self) -> usize {
        let active = usize::from(self.active.is_some());
        let preload = usize::from(self.preload.handle_id().is_some());
        let incoming = usize::from(matches!(self.stage, Stage::Transitioning { .. }));
        active + preload + incoming
    }

    fn snapshot(&self) -> SequenceSnapshot {
        let phase = self.stage.phase();
        let progress_percent = if phase == SequencePhase::Completed && self.progress.total_duration > 0.0 {
            100.0
        } else {
            self.progress.percent()
        };
        let loaded = !phase.is_loading();

        SequenceSnapshot {
            session_id: self.session_id,
            phase,
            segment_count: self.queue.len(),
            active_index: self.queue.active_index(),
            active_segment_id: loaded.then(|| self.queue.active().id.clone()),
            elapsed_in_active: self.progress.elapsed_in_active,
            cumulative_before_active: self.progress.cumulative_before_active,
            elapsed_time: self.progress.total_elapsed(),
            total_duration: self.progress.total_duration,
            progress_percent,
            is_playing: self.is_playing,
            is_transitioning: matches!(self.stage, Stage::Transitioning { .. }),
            muted: self.muted,
            playback_rate: self.rate,
            durations_settled: self.durations_settled,
            durations_total: self.queue.len(),
            skipped: self.queue.skipped(),
            live_handles: self.live_handles(),
            error: match &self.stage {
                Stage::Error(message) => Some(message.clone()),
                _ => None,
            },
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
