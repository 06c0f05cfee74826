//! Segment definition

use serde::{Deserialize, Serialize};

/// One playable unit of a sequence
///
/// Immutable once the sequence is mounted; order within the sequence is
/// significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Opaque asset identifier
    pub id: String,

    /// Display title
    pub title: String,

    /// Optional thumbnail reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Segment {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            thumbnail: None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}
