/// ID types for Encore entities
use serde::{Deserialize, Serialize};
use std::fmt;

/// Album identifier, as assigned by the media library
pub type AlbumId = i64;

/// Artist identifier, as assigned by the media library
pub type ArtistId = i64;

/// Track identifier
///
/// Opaque and stable for the lifetime of the library entry. The same id may
/// appear several times in a queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Create a new track ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
