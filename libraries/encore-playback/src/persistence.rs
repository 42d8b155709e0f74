//! Queue and state persistence
//!
//! The controller writes a [`Snapshot`] through a [`PersistenceStore`] after
//! queue mutations (debounced) and on shutdown, and reads it once at start.
//! Failures are reported to the caller, who logs them and carries on.

use crate::error::Result;
use crate::state::PlaybackState;
use crate::types::{FinishAction, ShuffleMode};
use encore_core::{TrackFlags, TrackId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// One persisted queue slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Track identifier
    pub id: TrackId,

    /// Packed [`TrackFlags`] (insertion order and random-origin mark)
    pub flags: u32,
}

/// Persisted timeline and playback state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Position to seek to once `pending_seek_track_id` is loaded again
    #[serde(default)]
    pub pending_seek_ms: u64,

    /// Track the pending seek applies to
    #[serde(default)]
    pub pending_seek_track_id: Option<TrackId>,

    /// Queue slots in play order
    #[serde(default)]
    pub tracks: Vec<SnapshotEntry>,

    /// Index of the current slot
    #[serde(default)]
    pub current_pos: usize,

    /// Packed [`PlaybackState`]; only the finish action and shuffle mode are restored
    #[serde(default)]
    pub state_bits: u32,

    /// Order tags of the queue as it was before shuffling
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unshuffled_order: Vec<u32>,
}

impl Snapshot {
    /// Slot references in the form the queue restores from
    pub fn refs(&self) -> Vec<(TrackId, TrackFlags)> {
        self.tracks
            .iter()
            .map(|entry| (entry.id.clone(), TrackFlags::from_bits(entry.flags)))
            .collect()
    }

    /// Persisted finish action
    pub fn finish_action(&self) -> FinishAction {
        PlaybackState::from_bits(self.state_bits).finish_action()
    }

    /// Persisted shuffle mode
    pub fn shuffle_mode(&self) -> ShuffleMode {
        PlaybackState::from_bits(self.state_bits).shuffle_mode()
    }
}

/// Storage for snapshots
pub trait PersistenceStore: Send {
    /// Replace the stored snapshot
    fn save(&mut self, snapshot: &Snapshot) -> Result<()>;

    /// Read the stored snapshot, `None` if nothing was saved yet
    fn load(&mut self) -> Result<Option<Snapshot>>;
}

/// Snapshot kept as a JSON file
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash never leaves a half-written snapshot behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl PersistenceStore for JsonFileStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            serde_json::to_writer_pretty(&mut writer, snapshot)?;
            writer.flush()?;
        }
        fs::rename(&temp, &self.path)?;

        debug!(
            "Saved snapshot with {} tracks to {}",
            snapshot.tracks.len(),
            self.path.display()
        );
        Ok(())
    }

    fn load(&mut self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        debug!(
            "Loaded snapshot with {} tracks from {}",
            snapshot.tracks.len(),
            self.path.display()
        );
        Ok(Some(snapshot))
    }
}

/// Snapshot kept in memory
///
/// Clones share the stored value, so a test can hand one clone to the
/// controller and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<Snapshot>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a snapshot
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::default();
        *store.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        store
    }

    /// Last saved snapshot
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of completed saves
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistenceStore for MemoryStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    fn load(&mut self) -> Result<Option<Snapshot>> {
        Ok(self.snapshot())
    }
}
