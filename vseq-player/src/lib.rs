//! # VSeq Player Library (vseq-player)
//!
//! Video sequence playback and duration-aggregation engine.
//!
//! **Purpose:** Resolve remote video segments, pre-compute the total playback
//! duration of a sequence, chain the segments into one continuous playback
//! with the next segment preloaded, and report aggregate progress.
//!
//! **Architecture:** One controller task per mounted sequence, driving
//! playback handles supplied by a pluggable media backend.
//!
//! - [`resolver`]: segment id → playable URI, coalesced and cached
//! - [`duration`]: duration cache, one-shot prober, sequence totals
//! - [`media`]: playback handle abstraction and a simulated backend
//! - [`playback`]: sequence controller and its handle
//! - [`reporter`]: phase/status/percent derivation for display

pub mod config;
pub mod context;
pub mod duration;
pub mod error;
pub mod media;
pub mod playback;
pub mod reporter;
pub mod resolver;
pub mod segment;

pub use config::PlayerConfig;
pub use context::PlayerContext;
pub use error::{Error, Result};
pub use playback::{SequenceHandle, SequenceSnapshot};
pub use reporter::{StatusReport, StatusReporter};
pub use segment::Segment;
