//! Playback-related type definitions
//!
//! Supporting types for sequence phase and play/pause state.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a mounted sequence
///
/// `Transitioning` is only visible between triggering a segment switch and
/// completing the handle swap. `Completed` and `Error` are terminal for a
/// mount.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SequencePhase {
    /// Mounted, nothing issued yet
    Initializing,
    /// Pre-flight duration probes in flight
    CalculatingDurations,
    /// Resolving and loading the first segment
    PreparingFirstSegment,
    /// Active handle loaded, not yet playing
    Ready,
    /// Active handle playing
    Playing,
    /// Active handle paused by the user
    Paused,
    /// Preload handle promoted, swap pending
    Transitioning,
    /// Final segment reached end of content
    Completed,
    /// Unrecoverable failure of the active segment
    Error,
}

impl SequencePhase {
    /// True once the sequence can no longer make progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, SequencePhase::Completed | SequencePhase::Error)
    }

    /// True while the pre-flight (probe/resolve/load) work is still running
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            SequencePhase::Initializing
                | SequencePhase::CalculatingDurations
                | SequencePhase::PreparingFirstSegment
        )
    }
}

impl std::fmt::Display for SequencePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequencePhase::Initializing => write!(f, "initializing"),
            SequencePhase::CalculatingDurations => write!(f, "calculating-durations"),
            SequencePhase::PreparingFirstSegment => write!(f, "preparing-first-segment"),
            SequencePhase::Ready => write!(f, "ready"),
            SequencePhase::Playing => write!(f, "playing"),
            SequencePhase::Paused => write!(f, "paused"),
            SequencePhase::Transitioning => write!(f, "transitioning"),
            SequencePhase::Completed => write!(f, "completed"),
            SequencePhase::Error => write!(f, "error"),
        }
    }
}

/// Playback state enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_serializes_kebab_case() {
        let json = serde_json::to_string(&SequencePhase::CalculatingDurations).unwrap();
        assert_eq!(json, "\"calculating-durations\"");
        assert_eq!(SequencePhase::PreparingFirstSegment.to_string(), "preparing-first-segment");
    }

    #[test]
    fn test_terminal_phases() {
        assert!(SequencePhase::Completed.is_terminal());
        assert!(SequencePhase::Error.is_terminal());
        assert!(!SequencePhase::Transitioning.is_terminal());
        assert!(!SequencePhase::Paused.is_terminal());
    }

    #[test]
    fn test_loading_phases() {
        assert!(SequencePhase::Initializing.is_loading());
        assert!(SequencePhase::CalculatingDurations.is_loading());
        assert!(SequencePhase::PreparingFirstSegment.is_loading());
        assert!(!SequencePhase::Ready.is_loading());
    }
}
