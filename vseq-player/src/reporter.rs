//! Progress/status reporter
//!
//! Pure derivation from a [`SequenceSnapshot`] to what the presentation
//! layer shows: phase, a status line, a percentage and which controls are
//! usable. Holds no state of its own.

use crate::playback::SequenceSnapshot;
use serde::Serialize;
use vseq_common::events::SequencePhase;
use vseq_common::human_time::{format_clock, format_clock_pair, format_percent};

/// Controls the presentation layer may enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub play_pause: bool,
    pub seek: bool,
    pub mute: bool,
}

/// Display tuple for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub phase: SequencePhase,
    pub message: String,
    pub percent: f64,
    pub controls: Controls,
}

pub struct StatusReporter;

impl StatusReporter {
    pub fn report(snapshot: &SequenceSnapshot) -> StatusReport {
        let phase = snapshot.phase;

        let message = match phase {
            SequencePhase::Initializing => "Loading video resources...".to_string(),
            SequencePhase::CalculatingDurations => format!(
                "Calculating sequence duration... ({})",
                format_percent(snapshot.duration_progress_percent())
            ),
            SequencePhase::PreparingFirstSegment => {
                "Preparing your personalized video sequence...".to_string()
            }
            SequencePhase::Ready
            | SequencePhase::Playing
            | SequencePhase::Paused
            | SequencePhase::Transitioning => {
                format_clock_pair(snapshot.elapsed_time, snapshot.total_duration)
            }
            SequencePhase::Completed => format!(
                "Sequence complete ({})",
                format_clock(snapshot.total_duration)
            ),
            SequencePhase::Error => snapshot
                .error
                .clone()
                .unwrap_or_else(|| "Playback failed".to_string()),
        };

        let percent = match phase {
            SequencePhase::CalculatingDurations => snapshot.duration_progress_percent(),
            SequencePhase::Initializing | SequencePhase::PreparingFirstSegment => 0.0,
            _ => snapshot.progress_percent,
        };

        let controls = Controls {
            play_pause: matches!(
                phase,
                SequencePhase::Ready
                    | SequencePhase::Playing
                    | SequencePhase::Paused
                    | SequencePhase::Transitioning
            ),
            seek: matches!(
                phase,
                SequencePhase::Ready | SequencePhase::Playing | SequencePhase::Paused
            ),
            mute: !phase.is_terminal(),
        };

        StatusReport {
            phase,
            message,
            percent,
            controls,
        }
    }
}
