/// Library query criteria
use crate::types::{AlbumId, ArtistId, TrackId};
use serde::{Deserialize, Serialize};

/// What to select from the media library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    /// Every track, in library order
    All,

    /// Specific tracks, in the given order (duplicates kept, missing ids skipped)
    Tracks(Vec<TrackId>),

    /// All tracks of an album, in library order
    Album(AlbumId),

    /// All tracks of an artist, in library order
    Artist(ArtistId),
}

/// Grouping used when enqueueing "more like this" from a single track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupType {
    /// Just the track itself
    Song,

    /// The track's whole album
    Album,

    /// Everything by the track's artist
    Artist,
}
