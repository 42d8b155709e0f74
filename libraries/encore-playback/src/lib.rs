//! Encore - Playback Orchestration
//!
//! Platform-agnostic playback engine for Encore.
//!
//! This crate provides:
//! - Track queue with shuffle (songs, albums) and finish actions
//! - Random playback with a bounded history window
//! - Gapless hand-off between two audio backends
//! - Idle fade-out with a grace period for resuming
//! - Audio focus handling (ducking, transient loss)
//! - Debounced persistence of the queue and resume position
//! - Observer notifications with monotonic timestamps
//!
//! # Architecture
//!
//! `encore-playback` never decodes or outputs audio itself:
//! - Audio output is an [`AudioBackend`] implemented by the front end
//! - Tracks come from an [`encore_core::MediaLibrary`]
//! - State is saved through a [`PersistenceStore`]
//!
//! All mutations run on a single worker thread owned by [`PlaybackService`].
//! Callers talk to it through a cloneable [`ServiceHandle`]. The
//! [`Controller`] inside the worker can also be driven directly, which is how
//! the tests control time with a [`ManualClock`].
//!
//! # Example: Queue
//!
//! ```rust
//! use encore_core::{InMemoryLibrary, Query, Track};
//! use encore_playback::{AddAux, AddMode, ShiftDelta, TrackQueue};
//!
//! let library = InMemoryLibrary::new(vec![
//!     Track::new("a", "/music/a.flac", "Intro"),
//!     Track::new("b", "/music/b.flac", "Outro"),
//! ]);
//!
//! let mut queue = TrackQueue::new();
//! queue.add_tracks(&library, &Query::All, AddMode::Play, &AddAux::None);
//! assert_eq!(queue.current().map(|t| t.title.as_str()), Some("Intro"));
//!
//! queue.shift_current(&library, ShiftDelta::NextSong);
//! assert_eq!(queue.current().map(|t| t.title.as_str()), Some("Outro"));
//! ```
//!
//! # Example: Service
//!
//! ```rust,no_run
//! use encore_core::{InMemoryLibrary, Query};
//! use encore_playback::{
//!     AddAux, AddMode, AudioBackend, JsonFileStore, PlaybackConfig, PlaybackService,
//!     ServiceParts,
//! };
//! use std::sync::Arc;
//!
//! # fn backends() -> [Box<dyn AudioBackend>; 2] { unimplemented!() }
//! # fn main() -> encore_playback::Result<()> {
//! let service = PlaybackService::spawn(ServiceParts {
//!     config: PlaybackConfig::default(),
//!     library: Arc::new(InMemoryLibrary::default()),
//!     backends: backends(),
//!     store: Box::new(JsonFileStore::new("/tmp/encore/queue.json")),
//!     observers: Vec::new(),
//! })?;
//!
//! let handle = service.handle();
//! handle.wait_ready()?;
//! handle.add_tracks(Query::All, AddMode::Play, AddAux::None)?;
//!
//! service.shutdown()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod clock;
mod commands;
mod controller;
mod error;
mod events;
mod persistence;
mod queue;
mod scheduler;
mod service;
mod shuffle;
mod state;
pub mod types;

// Public exports
pub use backend::{AudioBackend, CompletionCallback, ErrorCallback};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::Command;
pub use controller::{Controller, Message, PendingSeek};
pub use error::{LoadError, PlaybackError, Result};
pub use events::{EventForwarder, Observer, PlaybackEvent, QueueEvent, Timestamp};
pub use persistence::{JsonFileStore, MemoryStore, PersistenceStore, Snapshot, SnapshotEntry};
pub use queue::{TrackQueue, DEFAULT_RANDOM_HISTORY};
pub use service::{PlaybackService, ServiceHandle, ServiceParts, Status};
pub use shuffle::permutation;
pub use state::PlaybackState;
pub use types::{
    AddAux, AddMode, FinishAction, FocusChange, PlaybackConfig, ShiftDelta, ShuffleMode,
};
