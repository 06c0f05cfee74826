//! Presentation-facing handle to a mounted sequence
//!
//! Every control call is a round trip to the controller task. State is read
//! from the latest published [`SequenceSnapshot`]; segment changes and
//! completion are delivered as [`SequenceEvent`]s on the shared event bus.
//!
//! Dropping the handle unmounts the sequence.

use super::controller::{Command, Reply};
use super::state::SequenceSnapshot;
use crate::error::{Error, Result};
use crate::reporter::{StatusReport, StatusReporter};
use crate::segment::Segment;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use vseq_common::events::{EventBus, SequenceEvent};

pub struct SequenceHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SequenceSnapshot>,
    event_bus: EventBus,
}

impl SequenceHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        snapshot: watch::Receiver<SequenceSnapshot>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            commands,
            snapshot,
            event_bus,
        }
    }

    /// Latest published state
    pub fn snapshot(&self) -> SequenceSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<SequenceSnapshot> {
        self.snapshot.clone()
    }

    /// Subscribe to sequence events (segment changes, completion, failures)
    pub fn subscribe(&self) -> broadcast::Receiver<SequenceEvent> {
        self.event_bus.subscribe()
    }

    /// Display status derived from the latest state
    pub fn status(&self) -> StatusReport {
        StatusReporter::report(&self.snapshot.borrow())
    }

    /// Wait until the published state satisfies `predicate`
    ///
    /// Returns `Shutdown` if the controller exits first.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<SequenceSnapshot>
    where
        F: FnMut(&SequenceSnapshot) -> bool,
    {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| Error::Shutdown)?;
        Ok(snapshot.clone())
    }

    /// Wait until the sequence completes or fails
    pub async fn wait_until_finished(&self) -> Result<SequenceSnapshot> {
        self.wait_for(|s| s.phase.is_terminal()).await
    }

    pub async fn play(&self) -> Result<()> {
        self.request(Command::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.request(Command::TogglePlayPause).await
    }

    /// Seek within the active segment; the target is clamped to its bounds
    pub async fn seek(&self, position: f64) -> Result<()> {
        self.request(|reply| Command::Seek(position, reply)).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.request(|reply| Command::SetMuted(muted, reply)).await
    }

    pub async fn toggle_mute(&self) -> Result<()> {
        self.request(Command::ToggleMute).await
    }

    /// Change the playback rate; it carries over to later segments
    pub async fn set_rate(&self, rate: f64) -> Result<()> {
        self.request(|reply| Command::SetRate(rate, reply)).await
    }

    /// Tear down the current sequence and start over with `segments`
    pub async fn replace_sequence(&self, segments: Vec<Segment>) -> Result<()> {
        self.request(|reply| Command::Replace(segments, reply)).await
    }

    /// Cancel in-flight work, release every handle and stop the controller
    pub async fn unmount(&self) -> Result<()> {
        self.request(Command::Unmount).await
    }

    async fn request<F>(&self, build: F) -> Result<()>
    where
        F: FnOnce(Reply) -> Command,
    {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| Error::Shutdown)?;
        rx.await.map_err(|_| Error::Shutdown)?
    }
}

impl std::fmt::Debug for SequenceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.borrow();
        f.debug_struct("SequenceHandle")
            .field("session_id", &snapshot.session_id)
            .field("phase", &snapshot.phase)
            .finish()
    }
}
