/// Track domain type
use crate::types::{AlbumId, ArtistId, TrackId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Bit marking a track appended automatically by the random finish action
const RANDOM_ORIGIN_BIT: u32 = 1 << 31;

/// Per-slot bookkeeping carried by a track while it sits in a queue
///
/// `order` is the insertion sequence number of the slot. It survives shuffles,
/// so it doubles as the slot identity (the same track id may occupy several
/// slots) and as the key for restoring the unshuffled order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TrackFlags {
    /// Original insertion order of the slot
    pub order: u32,

    /// Appended by the random finish action rather than by the user
    pub random_origin: bool,
}

impl TrackFlags {
    /// Pack into the persisted `u32` form
    pub fn to_bits(self) -> u32 {
        let order = self.order & !RANDOM_ORIGIN_BIT;
        if self.random_origin {
            order | RANDOM_ORIGIN_BIT
        } else {
            order
        }
    }

    /// Unpack from the persisted `u32` form
    pub fn from_bits(bits: u32) -> Self {
        Self {
            order: bits & !RANDOM_ORIGIN_BIT,
            random_origin: bits & RANDOM_ORIGIN_BIT != 0,
        }
    }
}

/// Playable item
///
/// Treated as a value: a track is never mutated once its descriptive fields
/// are filled, it is re-created instead (see [`Track::with_flags`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// File path (or URI) handed to the audio backend
    pub path: PathBuf,

    /// Track title
    pub title: String,

    /// Artist name
    #[serde(default)]
    pub artist: String,

    /// Album name
    #[serde(default)]
    pub album: String,

    /// Album identifier
    #[serde(default)]
    pub album_id: Option<AlbumId>,

    /// Artist identifier
    #[serde(default)]
    pub artist_id: Option<ArtistId>,

    /// Track duration in milliseconds, when the library knows it
    #[serde(default)]
    pub duration_ms: Option<u64>,

    /// Queue bookkeeping (insertion order, random origin)
    #[serde(default, skip_serializing)]
    pub flags: TrackFlags,
}

impl Track {
    /// Create a new track with minimal metadata
    pub fn new(id: impl Into<TrackId>, path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            album_id: None,
            artist_id: None,
            duration_ms: None,
            flags: TrackFlags::default(),
        }
    }

    /// Builder: set album name and id
    #[must_use]
    pub fn with_album(mut self, album_id: AlbumId, album: impl Into<String>) -> Self {
        self.album_id = Some(album_id);
        self.album = album.into();
        self
    }

    /// Builder: set artist name and id
    #[must_use]
    pub fn with_artist(mut self, artist_id: ArtistId, artist: impl Into<String>) -> Self {
        self.artist_id = Some(artist_id);
        self.artist = artist.into();
        self
    }

    /// Builder: set duration
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    /// Re-create this track with different queue flags
    #[must_use]
    pub fn with_flags(&self, flags: TrackFlags) -> Self {
        Self {
            flags,
            ..self.clone()
        }
    }

    /// Whether the descriptive fields were resolved by the media library
    pub fn is_filled(&self) -> bool {
        !self.title.is_empty() && !self.path.as_os_str().is_empty()
    }

    /// Get the track duration as a Duration
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    /// Whether this and `other` occupy the same queue slot
    pub fn same_slot(&self, other: &Track) -> bool {
        self.id == other.id && self.flags.order == other.flags.order
    }
}
