//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Shuffle mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    /// No shuffling
    #[default]
    None,

    /// Every song independently
    Songs,

    /// Album order shuffled, track order inside each album kept
    Albums,
}

impl ShuffleMode {
    /// Next mode in the UI cycle (None -> Songs -> Albums -> None)
    #[must_use]
    pub fn cycled(self) -> Self {
        match self {
            Self::None => Self::Songs,
            Self::Songs => Self::Albums,
            Self::Albums => Self::None,
        }
    }

    /// Whether any shuffling is active
    pub fn is_shuffling(self) -> bool {
        self != Self::None
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Songs => "songs",
            Self::Albums => "albums",
        }
    }

    pub(crate) fn to_bits(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Songs => 1,
            Self::Albums => 2,
        }
    }

    pub(crate) fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::Songs,
            2 => Self::Albums,
            _ => Self::None,
        }
    }
}

impl fmt::Display for ShuffleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happens when playback reaches the end of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishAction {
    /// Stop after the last track
    #[default]
    Stop,

    /// Loop the whole queue
    RepeatAll,

    /// Loop the current track
    RepeatCurrent,

    /// Keep extending the queue with random library tracks
    Random,
}

impl FinishAction {
    /// Next action in the UI cycle (Stop -> RepeatAll -> RepeatCurrent -> Random -> Stop)
    #[must_use]
    pub fn cycled(self) -> Self {
        match self {
            Self::Stop => Self::RepeatAll,
            Self::RepeatAll => Self::RepeatCurrent,
            Self::RepeatCurrent => Self::Random,
            Self::Random => Self::Stop,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::RepeatAll => "repeat_all",
            Self::RepeatCurrent => "repeat_current",
            Self::Random => "random",
        }
    }

    pub(crate) fn to_bits(self) -> u32 {
        match self {
            Self::Stop => 0,
            Self::RepeatAll => 1,
            Self::RepeatCurrent => 2,
            Self::Random => 3,
        }
    }

    pub(crate) fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::RepeatAll,
            2 => Self::RepeatCurrent,
            3 => Self::Random,
            _ => Self::Stop,
        }
    }
}

impl fmt::Display for FinishAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How query results are merged into the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddMode {
    /// Replace the queue and start from the first result
    Play,

    /// Drop everything after the current track, insert results after it
    FlushAndPlayNext,

    /// Append to the end
    Enqueue,

    /// Like `Play`; aux is an index into the results that should come first
    PlayPosFirst,

    /// Like `Enqueue`; aux is a track id that should come first
    EnqueueIdFirst,

    /// Like `Play`; aux is a track id that should come first
    PlayIdFirst,

    /// Like `Enqueue`; aux is an index into the results that should come first
    EnqueuePosFirst,

    /// Insert right after the current track, keeping everything else
    EnqueueAsNext,
}

impl AddMode {
    /// Whether the mode replaces the whole queue
    pub(crate) fn replaces_queue(self) -> bool {
        matches!(self, Self::Play | Self::PlayPosFirst | Self::PlayIdFirst)
    }
}

/// Extra argument for the `*First` add modes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddAux {
    /// No rotation
    #[default]
    None,

    /// Position inside the query result
    Position(usize),

    /// Track id inside the query result
    Id(encore_core::TrackId),
}

/// Relative move of the current position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftDelta {
    /// Back into the previous album
    PreviousAlbum,

    /// One song back
    PreviousSong,

    /// Stay, but re-resolve the current track
    Keep,

    /// One song forward
    NextSong,

    /// Forward to the first track of the next album
    NextAlbum,
}

impl ShiftDelta {
    pub(crate) fn song_step(self) -> i8 {
        match self {
            Self::PreviousAlbum | Self::PreviousSong => -1,
            Self::Keep => 0,
            Self::NextSong | Self::NextAlbum => 1,
        }
    }

    pub(crate) fn is_album(self) -> bool {
        matches!(self, Self::PreviousAlbum | Self::NextAlbum)
    }
}

/// Audio focus change reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusChange {
    /// Focus (re)gained
    Gain,

    /// Short interruption (notification, navigation prompt)
    LossTransient {
        /// Lowering the volume is acceptable instead of pausing
        can_duck: bool,
    },

    /// Another player took over
    Loss,
}

/// Configuration for the playback controller
///
/// Every timing constant of the state machine lives here so tests can shrink
/// them and front ends can tune them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Gapless playback enabled (default: true)
    pub gapless: bool,

    /// Pause after this much inactivity (default: disabled)
    pub idle_timeout_ms: Option<u64>,

    /// A user action this soon after an idle pause resumes playback (default: 60 s)
    pub idle_grace_ms: u64,

    /// Interval between fade-out volume steps (default: 50 ms)
    pub fade_step_interval_ms: u64,

    /// Volume factor removed per fade step (default: 0.05)
    pub fade_step: f32,

    /// Release the backends after being paused this long (default: 5 min)
    pub sleep_after_ms: u64,

    /// Coalescing window for state saves (default: 5 s)
    pub save_debounce_ms: u64,

    /// Coalescing window for gapless preload refreshes (default: 250 ms)
    pub preload_debounce_ms: u64,

    /// Delay before skipping past a track that failed to load (default: 1 s)
    pub auto_skip_delay_ms: u64,

    /// Consecutive automatic skips before giving up (default: 10)
    pub max_auto_skips: u32,

    /// "Previous" restarts the track once this much has played (default: 5 s)
    pub rewind_threshold_ms: u64,

    /// Fraction of a track that counts as played on restart (default: 0.8)
    pub played_fraction: f32,

    /// Delay before a finished track is reported as played (default: 2 s)
    pub count_played_delay_ms: u64,

    /// Window in which a second button press opens the UI (default: 400 ms)
    pub double_press_window_ms: u64,

    /// Entries kept around the current position in random mode (default: 20)
    pub random_history: usize,
}

impl PlaybackConfig {
    /// Idle timeout as a Duration
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            gapless: true,
            idle_timeout_ms: None,
            idle_grace_ms: 60_000,
            fade_step_interval_ms: 50,
            fade_step: 0.05,
            sleep_after_ms: 300_000,
            save_debounce_ms: 5_000,
            preload_debounce_ms: 250,
            auto_skip_delay_ms: 1_000,
            max_auto_skips: 10,
            rewind_threshold_ms: 5_000,
            played_fraction: 0.8,
            count_played_delay_ms: 2_000,
            double_press_window_ms: 400,
            random_history: 20,
        }
    }
}
