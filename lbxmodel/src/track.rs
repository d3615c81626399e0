//! Track and identifier types.

use serde::{Deserialize, Serialize};

/// Length of a well-formed catalog video identifier.
pub const TRACK_ID_LEN: usize = 11;

/// Opaque, stable catalog identifier (an 11-character video handle).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Catalog ids are always 11 URL-safe characters; anything else is noise
    /// from the search API or a malformed command payload.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == TRACK_ID_LEN
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A playable catalog entry.
///
/// Immutable once created; two tracks are equal when their ids are equal,
/// whatever the snippet fields say.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    #[serde(rename = "videoId")]
    pub id: TrackId,
    pub title: String,
    pub channel: String,
    pub thumbnail: String,
}

impl Track {
    pub fn new(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        channel: impl Into<String>,
        thumbnail: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            channel: channel.into(),
            thumbnail: thumbnail.into(),
        }
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}
