//! Segment queue
//!
//! Tracks which segment of a mounted sequence is active and which segments
//! were dropped because their preload failed.
//!
//! - Active: currently playing (or loading, before the first swap)
//! - Candidates: later segments not marked skipped, in order

use crate::error::{Error, Result};
use crate::segment::Segment;

/// Ordered, fixed list of segments with an active position
#[derive(Debug, Clone)]
pub struct SegmentQueue {
    segments: Vec<Segment>,

    /// Parallel to `segments`
    skipped: Vec<bool>,

    active: usize,
}

impl SegmentQueue {
    /// Create a queue positioned on the first segment
    ///
    /// # Errors
    /// Returns `InvalidRequest` for an empty list.
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::InvalidRequest(
                "a sequence needs at least one segment".to_string(),
            ));
        }

        let skipped = vec![false; segments.len()];
        Ok(Self {
            segments,
            skipped,
            active: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; an empty queue cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn ids(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.id.clone()).collect()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &Segment {
        &self.segments[self.active]
    }

    /// First non-skipped segment after `index`
    pub fn next_candidate(&self, index: usize) -> Option<usize> {
        (index + 1..self.segments.len()).find(|&i| !self.skipped[i])
    }

    pub fn mark_skipped(&mut self, index: usize) {
        if let Some(flag) = self.skipped.get_mut(index) {
            *flag = true;
        }
    }

    pub fn is_skipped(&self, index: usize) -> bool {
        self.skipped.get(index).copied().unwrap_or(false)
    }

    /// Indices of skipped segments, ascending
    pub fn skipped(&self) -> Vec<usize> {
        (0..self.segments.len()).filter(|&i| self.is_skipped(i)).collect()
    }

    /// Move the active position forward to `index`
    ///
    /// Returns the indices left behind (the previous active segment plus any
    /// skipped segments in between).
    ///
    /// # Errors
    /// Returns `InvalidState` when `index` is not ahead of the active position
    /// or is out of range.
    pub fn advance_to(&mut self, index: usize) -> Result<std::ops::Range<usize>> {
        if index <= self.active || index >= self.segments.len() {
            return Err(Error::InvalidState(format!(
                "cannot advance from segment {} to {}",
                self.active, index
            )));
        }

        let passed = self.active..index;
        self.active = index;
        Ok(passed)
    }
}
