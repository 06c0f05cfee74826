//! Sequence progress accounting and the published snapshot

use serde::Serialize;
use uuid::Uuid;
use vseq_common::events::SequencePhase;

/// Elapsed/total accounting across segment boundaries
///
/// `cumulative_before_active` only grows when a segment is left behind, by
/// that segment's measured duration. Elapsed time within the active segment
/// is clamped to the active segment's measured duration, so the overall
/// elapsed time never runs ahead of the precomputed total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SequenceProgress {
    pub active_index: usize,
    pub elapsed_in_active: f64,
    pub cumulative_before_active: f64,
    pub total_duration: f64,
}

impl SequenceProgress {
    pub fn new(total_duration: f64) -> Self {
        Self {
            total_duration,
            ..Self::default()
        }
    }

    pub fn total_elapsed(&self) -> f64 {
        self.cumulative_before_active + self.elapsed_in_active
    }

    /// Percentage of the total elapsed, 0 when the total is unknown
    pub fn percent(&self) -> f64 {
        if self.total_duration > 0.0 {
            (self.total_elapsed() / self.total_duration * 100.0).min(100.0)
        } else {
            0.0
        }
    }

    /// Record a position report for the active segment
    pub fn set_elapsed(&mut self, position: f64, active_duration: f64) {
        self.elapsed_in_active = if position.is_finite() {
            position.clamp(0.0, active_duration.max(0.0))
        } else {
            0.0
        };
    }

    /// Leave the active segment(s) behind and start `next_index` at zero
    pub fn advance(&mut self, next_index: usize, passed_duration: f64) {
        self.cumulative_before_active += passed_duration.max(0.0);
        self.elapsed_in_active = 0.0;
        self.active_index = next_index;
    }

    /// Pin progress to the end of the sequence
    pub fn complete(&mut self, active_duration: f64) {
        let active_duration = active_duration.max(0.0);
        let before = (self.total_duration - active_duration).max(self.cumulative_before_active);
        self.cumulative_before_active = before;
        self.elapsed_in_active = active_duration;
    }
}

/// Presentation-facing view of a mounted sequence
///
/// Published through a `watch` channel after every controller step that
/// changes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceSnapshot {
    pub session_id: Uuid,
    pub phase: SequencePhase,
    pub segment_count: usize,
    pub active_index: usize,
    pub active_segment_id: Option<String>,
    pub elapsed_in_active: f64,
    pub cumulative_before_active: f64,
    /// Overall elapsed seconds
    pub elapsed_time: f64,
    pub total_duration: f64,
    pub progress_percent: f64,
    pub is_playing: bool,
    pub is_transitioning: bool,
    pub muted: bool,
    pub playback_rate: f64,
    /// Pre-flight duration lookups settled so far
    pub durations_settled: usize,
    pub durations_total: usize,
    pub skipped: Vec<usize>,
    /// Playback handles currently owned by the controller
    pub live_handles: usize,
    pub error: Option<String>,
}

impl SequenceSnapshot {
    /// Snapshot of a freshly mounted sequence
    pub fn initial(session_id: Uuid, segment_count: usize, muted: bool, playback_rate: f64) -> Self {
        Self {
            session_id,
            phase: SequencePhase::Initializing,
            segment_count,
            active_index: 0,
            active_segment_id: None,
            elapsed_in_active: 0.0,
            cumulative_before_active: 0.0,
            elapsed_time: 0.0,
            total_duration: 0.0,
            progress_percent: 0.0,
            is_playing: false,
            is_transitioning: false,
            muted,
            playback_rate,
            durations_settled: 0,
            durations_total: segment_count,
            skipped: Vec::new(),
            live_handles: 0,
            error: None,
        }
    }

    /// Fraction of pre-flight lookups settled, as a percentage
    pub fn duration_progress_percent(&self) -> f64 {
        if self.durations_total == 0 {
            100.0
        } else {
            self.durations_settled as f64 / self.durations_total as f64 * 100.0
        }
    }
}
