//! Platform-agnostic audio backend trait
//!
//! Abstracts a single-track player so the controller can drive desktop,
//! embedded or test backends alike. Two instances live at once so the next
//! track can be primed for a gapless hand-off.

use crate::error::LoadError;
use std::path::Path;

/// Invoked when the loaded track played to its end
pub type CompletionCallback = Box<dyn Fn() + Send + Sync>;

/// Invoked when playback failed after a successful load
pub type ErrorCallback = Box<dyn Fn(String) + Send + Sync>;

/// Black-box single-track player
///
/// Callbacks may fire on any thread. The controller installs callbacks that
/// only post a message to its worker queue.
pub trait AudioBackend: Send {
    /// Open a source and prepare it for playback
    fn load(&mut self, path: &Path) -> Result<(), LoadError>;

    /// Start or resume playback of the loaded source
    fn play(&mut self);

    /// Pause playback, keeping the position
    fn pause(&mut self);

    /// Stop playback and rewind
    fn stop(&mut self);

    /// Release the loaded source
    fn reset(&mut self);

    /// Seek inside the loaded source
    fn seek_to(&mut self, position_ms: u64);

    /// Current position in milliseconds
    fn current_position_ms(&self) -> u64;

    /// Duration of the loaded source, when known
    fn duration_ms(&self) -> Option<u64>;

    /// Whether audio is being produced right now
    fn is_playing(&self) -> bool;

    /// Multiplier on the output volume, in `[0.0, 1.0]`
    fn set_volume_factor(&mut self, factor: f32);

    /// Lower the volume for a transient competing sound
    fn set_ducking(&mut self, ducking: bool);

    /// Register the completion callback (replaces any previous one)
    fn on_completion(&mut self, callback: CompletionCallback);

    /// Register the error callback (replaces any previous one)
    fn on_error(&mut self, callback: ErrorCallback);
}
