//! Sequence playback
//!
//! - [`controller`]: the single task owning a mounted sequence
//! - [`handle`]: presentation-facing control surface
//! - [`queue`]: active position and skipped segments
//! - [`state`]: progress accounting and the published snapshot

pub(crate) mod controller;
pub mod handle;
pub mod queue;
pub mod state;

pub use handle::SequenceHandle;
pub use queue::SegmentQueue;
pub use state::{SequenceProgress, SequenceSnapshot};
