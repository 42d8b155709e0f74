//! Encore Core
//!
//! Platform-agnostic core types and the media library contract shared by the
//! Encore playback engine and its front ends.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `TrackFlags`, `Query`
//! - **Collaborator Traits**: `MediaLibrary` (query + random pick contract)
//! - **Reference Library**: `InMemoryLibrary`, with its caches owned as fields
//! - **Error Handling**: Unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use encore_core::{InMemoryLibrary, MediaLibrary, Query, Track};
//!
//! let library = InMemoryLibrary::new(vec![
//!     Track::new("a", "/music/a.flac", "Intro"),
//!     Track::new("b", "/music/b.flac", "Outro"),
//! ]);
//!
//! assert!(library.is_any_track_available());
//! assert_eq!(library.query(&Query::All).len(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod library;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use library::{InMemoryLibrary, MediaLibrary};
pub use types::{AlbumId, ArtistId, GroupType, Query, Track, TrackFlags, TrackId};
