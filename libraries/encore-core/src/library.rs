//! Media library contract
//!
//! The playback engine never talks to a storage engine directly. It asks a
//! [`MediaLibrary`] to resolve queries into ordered tracks and to hand out a
//! random track for the random finish action.
//!
//! Library-wide caches (playable track count, shuffled pick pool) belong to the
//! library implementation and are dropped through [`MediaLibrary::invalidate`]
//! whenever the library reports a change.

use crate::error::Result;
use crate::types::{Query, Track, TrackId};
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::debug;

/// Query interface to the track library
///
/// Implementations must be cheap to call from the playback worker thread.
pub trait MediaLibrary: Send + Sync {
    /// Resolve a query into an ordered list of tracks
    ///
    /// Tracks whose metadata could not be resolved may be returned unfilled;
    /// callers discard them. Zero rows is not an error.
    fn query(&self, query: &Query) -> Vec<Track>;

    /// Pick one random playable track
    fn random_track(&self) -> Option<Track>;

    /// Whether the library holds any playable track at all (cached)
    fn is_any_track_available(&self) -> bool;

    /// Drop cached library-wide state after a library change
    fn invalidate(&self) {}
}

/// Caches owned by [`InMemoryLibrary`]
#[derive(Debug, Default)]
struct LibraryCache {
    /// Number of filled tracks, computed lazily
    playable_count: Option<usize>,

    /// Indices still to hand out by `random_track`, already shuffled
    shuffled_pool: Vec<usize>,
}

/// Library held entirely in memory
///
/// Used by the command shell (loaded from a JSON manifest) and by tests.
#[derive(Debug, Default)]
pub struct InMemoryLibrary {
    tracks: RwLock<Vec<Track>>,
    cache: Mutex<LibraryCache>,
}

impl InMemoryLibrary {
    /// Create a library from a list of tracks
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: RwLock::new(tracks),
            cache: Mutex::new(LibraryCache::default()),
        }
    }

    /// Load a library from a JSON array of tracks
    pub fn from_json_reader(reader: impl Read) -> Result<Self> {
        let tracks: Vec<Track> = serde_json::from_reader(reader)?;
        debug!("Loaded library manifest with {} tracks", tracks.len());
        Ok(Self::new(tracks))
    }

    /// Add a track and invalidate caches
    pub fn insert(&self, track: Track) {
        self.tracks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(track);
        self.invalidate();
    }

    /// Remove every track with the given id and invalidate caches
    ///
    /// Returns the number of removed entries.
    pub fn remove(&self, id: &TrackId) -> usize {
        let removed = {
            let mut tracks = self.tracks.write().unwrap_or_else(PoisonError::into_inner);
            let before = tracks.len();
            tracks.retain(|t| &t.id != id);
            before - tracks.len()
        };
        self.invalidate();
        removed
    }

    /// Number of entries (filled or not)
    pub fn len(&self) -> usize {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the library has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaLibrary for InMemoryLibrary {
    fn query(&self, query: &Query) -> Vec<Track> {
        let tracks = self.tracks.read().unwrap_or_else(PoisonError::into_inner);

        match query {
            Query::All => tracks.clone(),
            Query::Tracks(ids) => {
                let by_id: HashMap<&TrackId, &Track> = tracks.iter().map(|t| (&t.id, t)).collect();
                ids.iter()
                    .filter_map(|id| by_id.get(id).map(|t| (*t).clone()))
                    .collect()
            }
            Query::Album(album_id) => tracks
                .iter()
                .filter(|t| t.album_id == Some(*album_id))
                .cloned()
                .collect(),
            Query::Artist(artist_id) => tracks
                .iter()
                .filter(|t| t.artist_id == Some(*artist_id))
                .cloned()
                .collect(),
        }
    }

    fn random_track(&self) -> Option<Track> {
        let tracks = self.tracks.read().unwrap_or_else(PoisonError::into_inner);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);

        if cache.shuffled_pool.is_empty() {
            let mut pool: Vec<usize> = tracks
                .iter()
                .enumerate()
                .filter(|(_, t)| t.is_filled())
                .map(|(i, _)| i)
                .collect();
            pool.shuffle(&mut thread_rng());
            cache.shuffled_pool = pool;
        }

        cache
            .shuffled_pool
            .pop()
            .and_then(|index| tracks.get(index).cloned())
    }

    fn is_any_track_available(&self) -> bool {
        // Lock order is always tracks before cache
        let tracks = self.tracks.read().unwrap_or_else(PoisonError::into_inner);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let count = *cache
            .playable_count
            .get_or_insert_with(|| tracks.iter().filter(|t| t.is_filled()).count());
        count > 0
    }

    fn invalidate(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        *cache = LibraryCache::default();
    }
}
