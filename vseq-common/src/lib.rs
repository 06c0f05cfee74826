//! # VSeq Common Library
//!
//! Shared code for the video sequence player crates:
//! - Error type shared by the configuration helpers
//! - Event types (SequenceEvent enum) and the broadcast EventBus
//! - Configuration file resolution and TOML loading
//! - Human-readable time formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;

pub use error::{Error, Result};
pub use human_time::format_clock;
