//! Abstract command surface
//!
//! Bindable to a CLI, IPC or hardware buttons. Commands are delivered to the
//! worker as [`crate::Message::Command`].

use encore_core::{GroupType, Query, Track};
use serde::{Deserialize, Serialize};

/// User-facing playback command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Toggle between play and pause
    PlayPause,

    /// Start or resume playback
    Play,

    /// Pause playback
    Pause,

    /// Skip to the next track
    NextSong {
        /// Start playing even if currently paused
        autoplay: bool,
    },

    /// Restart the track, or go to the previous one early in the track
    PreviousSong {
        /// Start playing even if currently paused
        autoplay: bool,
    },

    /// Next shuffle mode (None -> Songs -> Albums)
    CycleShuffle,

    /// Next finish action (Stop -> RepeatAll -> RepeatCurrent -> Random)
    CycleRepeat,

    /// Drop everything queued after the current track
    ClearQueue,

    /// Remove everything from the queue
    EmptyQueue,

    /// Seek forward by this many seconds
    SeekForward(u32),

    /// Seek backward by this many seconds
    SeekBackward(u32),

    /// Enqueue the track, its album or its artist
    EnqueueFrom(Track, GroupType),

    /// Play/pause after the double-press window, unless pressed again
    DelayedToggle,

    /// Next track after the double-press window, unless pressed again
    DelayedNext,
}

/// Action waiting out the double-press window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DelayedAction {
    Toggle,
    Next,
}

/// Library query selecting `track` together with its group
pub(crate) fn group_query(track: &Track, group: GroupType) -> Query {
    let song = || Query::Tracks(vec![track.id.clone()]);
    match group {
        GroupType::Song => song(),
        GroupType::Album => track.album_id.map_or_else(song, Query::Album),
        GroupType::Artist => track.artist_id.map_or_else(song, Query::Artist),
    }
}
