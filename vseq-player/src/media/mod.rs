//! Media handle abstraction
//!
//! The GUI media layer is an external collaborator. The controller and the
//! duration prober only see it through [`MediaBackend`] (construct a handle
//! for a resolved source) and [`PlaybackHandle`] (drive it). Handles report
//! back asynchronously through the [`EventSink`] they were constructed with,
//! every event tagged with the handle's [`HandleId`].

pub mod simulated;

pub use simulated::SimulatedBackend;

use crate::error::Result;
use crate::resolver::ResolvedSource;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique playback handle identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl HandleId {
    /// Allocate a fresh identifier
    pub fn next() -> Self {
        HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// Events emitted by a playback handle
#[derive(Debug, Clone, PartialEq)]
pub enum HandleEvent {
    /// Source loaded, duration known (seconds)
    Ready { duration: f64 },
    /// Handle failed (load or playback)
    Error(String),
    /// Periodic position report (seconds)
    TimeUpdate(f64),
    /// Play state changed
    PlayingChanged(bool),
    /// Reached the end of the content
    EndOfContent,
}

/// A handle event tagged with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct HandleMessage {
    pub handle: HandleId,
    pub event: HandleEvent,
}

/// Sending half given to a backend when a handle is constructed
#[derive(Debug, Clone)]
pub struct EventSink {
    id: HandleId,
    tx: mpsc::UnboundedSender<HandleMessage>,
}

impl EventSink {
    pub fn new(id: HandleId, tx: mpsc::UnboundedSender<HandleMessage>) -> Self {
        Self { id, tx }
    }

    /// Handle this sink reports for
    pub fn handle_id(&self) -> HandleId {
        self.id
    }

    /// Emit an event. Returns false once the listener is gone.
    pub fn emit(&self, event: HandleEvent) -> bool {
        self.tx
            .send(HandleMessage {
                handle: self.id,
                event,
            })
            .is_ok()
    }

    /// True once the listening side has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A single playback object owned by the media layer
pub trait PlaybackHandle: Send {
    fn id(&self) -> HandleId;
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
    fn set_muted(&mut self, muted: bool);
    fn set_rate(&mut self, rate: f64);

    /// Duration in seconds once the source is loaded
    fn duration(&self) -> Option<f64>;

    /// Current position in seconds
    fn current_time(&self) -> f64;

    /// Stop emitting events and free media resources
    fn release(&mut self);
}

/// Factory for playback handles
pub trait MediaBackend: Send + Sync {
    /// Construct a handle for `source`. Loading starts immediately; the
    /// handle reports `Ready` or `Error` through `sink`.
    fn create(&self, source: &ResolvedSource, sink: EventSink) -> Result<Box<dyn PlaybackHandle>>;
}

/// Owning wrapper that releases its handle exactly once
///
/// Release happens on the explicit [`OwnedHandle::release`] call or on drop,
/// whichever comes first.
pub struct OwnedHandle {
    inner: Box<dyn PlaybackHandle>,
    released: bool,
}

impl OwnedHandle {
    pub fn new(inner: Box<dyn PlaybackHandle>) -> Self {
        Self {
            inner,
            released: false,
        }
    }

    pub fn id(&self) -> HandleId {
        self.inner.id()
    }

    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.inner.release();
            debug!(handle = %self.inner.id(), "Released playback handle");
        }
    }
}

impl std::ops::Deref for OwnedHandle {
    type Target = dyn PlaybackHandle;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl std::ops::DerefMut for OwnedHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for OwnedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("id", &self.inner.id())
            .field("released", &self.released)
            .finish()
    }
}
