//! Error types for playback management

use std::path::PathBuf;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The playback worker is gone
    #[error("Playback worker has stopped")]
    WorkerStopped,

    /// A blocking call was made from the playback worker thread
    #[error("Cannot wait for the playback worker from the worker thread itself")]
    CalledFromWorker,

    /// Worker thread could not be spawned or joined
    #[error("Worker thread error: {0}")]
    Thread(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure to open a source in an audio backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// Source does not exist
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Source exists but could not be decoded
    #[error("Unsupported or corrupt source {path}: {reason}")]
    Unsupported {
        /// Offending source
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// Any other backend failure
    #[error("Audio backend error: {0}")]
    Backend(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
