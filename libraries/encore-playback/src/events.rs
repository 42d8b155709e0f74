//! Playback Events
//!
//! Observer surface for UI synchronization. Notifications are delivered on
//! the playback worker thread, in the order the worker produced them:
//! - State changes (playing, error, empty queue, modes)
//! - Current track changes
//! - Queue diffs (previous/current/next replaced, position info, timeline)
//!
//! State and track notifications carry a [`Timestamp`] that is strictly
//! increasing per controller, so a receiver that hops threads can drop a
//! delivery older than the last one it applied.

use crate::state::PlaybackState;
use crossbeam_channel::Sender;
use encore_core::Track;
use serde::{Deserialize, Serialize};

/// Monotonic notification stamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

/// Receiver of playback notifications
///
/// # Re-entrancy
///
/// Observers are invoked synchronously on the playback worker while it holds
/// the controller. An observer must never block on the controller (for
/// example by calling [`crate::ServiceHandle::wait_ready`]) or otherwise
/// re-enter it synchronously. Posting a command through a
/// [`crate::ServiceHandle`] is fine: it only enqueues a message that runs
/// after the current one.
pub trait Observer: Send {
    /// Playback state changed
    fn on_state_changed(&mut self, timestamp: Timestamp, state: PlaybackState);

    /// The current track changed (`None` when nothing is selected)
    fn on_track_changed(&mut self, timestamp: Timestamp, track: Option<&Track>);

    /// The previous (-1), current (0) or next (1) queue slot now holds another track
    fn on_active_track_replaced(&mut self, delta: i8, track: Option<&Track>);

    /// Queue contents changed
    fn on_timeline_changed(&mut self);

    /// Queue position or length changed
    fn on_position_info_changed(&mut self);

    /// A user-facing error message
    fn on_error(&mut self, _timestamp: Timestamp, _message: &str) {}

    /// A track counts as played (feed for play counters)
    fn on_track_played(&mut self, _track: &Track) {}

    /// The playback notification must be made visible (focus was lost)
    fn on_notification_forced(&mut self) {}

    /// A double press asked for the player UI
    fn on_open_ui_requested(&mut self) {}
}

/// Owned form of every notification
///
/// Handy for observers that forward across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Playback state changed
    StateChanged {
        /// Notification stamp
        timestamp: Timestamp,
        /// The new state
        state: PlaybackState,
    },

    /// Current track changed
    TrackChanged {
        /// Notification stamp
        timestamp: Timestamp,
        /// The new current track
        track: Option<Track>,
    },

    /// A neighbouring slot was replaced
    ActiveTrackReplaced {
        /// -1 previous, 0 current, 1 next
        delta: i8,
        /// The track now in that slot
        track: Option<Track>,
    },

    /// Queue contents changed
    TimelineChanged,

    /// Queue position or length changed
    PositionInfoChanged,

    /// Error occurred during playback
    Error {
        /// Notification stamp
        timestamp: Timestamp,
        /// Error message
        message: String,
    },

    /// Track counted as played
    TrackPlayed {
        /// The played track
        track: Track,
    },

    /// Notification must be shown
    NotificationForced,

    /// UI requested by a double press
    OpenUiRequested,
}

/// Observer that forwards every notification into a channel
pub struct EventForwarder {
    tx: Sender<PlaybackEvent>,
}

impl EventForwarder {
    /// Create a forwarder
    pub fn new(tx: Sender<PlaybackEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: PlaybackEvent) {
        // A dropped receiver only means nobody listens anymore
        self.tx.send(event).ok();
    }
}

impl Observer for EventForwarder {
    fn on_state_changed(&mut self, timestamp: Timestamp, state: PlaybackState) {
        self.send(PlaybackEvent::StateChanged { timestamp, state });
    }

    fn on_track_changed(&mut self, timestamp: Timestamp, track: Option<&Track>) {
        self.send(PlaybackEvent::TrackChanged {
            timestamp,
            track: track.cloned(),
        });
    }

    fn on_active_track_replaced(&mut self, delta: i8, track: Option<&Track>) {
        self.send(PlaybackEvent::ActiveTrackReplaced {
            delta,
            track: track.cloned(),
        });
    }

    fn on_timeline_changed(&mut self) {
        self.send(PlaybackEvent::TimelineChanged);
    }

    fn on_position_info_changed(&mut self) {
        self.send(PlaybackEvent::PositionInfoChanged);
    }

    fn on_error(&mut self, timestamp: Timestamp, message: &str) {
        self.send(PlaybackEvent::Error {
            timestamp,
            message: message.to_string(),
        });
    }

    fn on_track_played(&mut self, track: &Track) {
        self.send(PlaybackEvent::TrackPlayed {
            track: track.clone(),
        });
    }

    fn on_notification_forced(&mut self) {
        self.send(PlaybackEvent::NotificationForced);
    }

    fn on_open_ui_requested(&mut self) {
        self.send(PlaybackEvent::OpenUiRequested);
    }
}

/// Queue diff produced by [`crate::TrackQueue`] mutations
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// Slot -1/0/1 relative to the current position holds another track
    ActiveTrackReplaced {
        /// -1 previous, 0 current, 1 next
        delta: i8,
        /// New occupant
        track: Option<Track>,
    },

    /// Position or length changed
    PositionInfoChanged,

    /// Contents changed
    TimelineChanged,
}

/// Fan-out to registered observers with monotonic stamps
#[derive(Default)]
pub(crate) struct Notifier {
    observers: Vec<Box<dyn Observer>>,
    last_timestamp: u64,
}

impl Notifier {
    pub(crate) fn subscribe(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    fn next_timestamp(&mut self) -> Timestamp {
        self.last_timestamp += 1;
        Timestamp(self.last_timestamp)
    }

    pub(crate) fn state_changed(&mut self, state: PlaybackState) {
        let timestamp = self.next_timestamp();
        for observer in &mut self.observers {
            observer.on_state_changed(timestamp, state);
        }
    }

    pub(crate) fn track_changed(&mut self, track: Option<&Track>) {
        let timestamp = self.next_timestamp();
        for observer in &mut self.observers {
            observer.on_track_changed(timestamp, track);
        }
    }

    pub(crate) fn error(&mut self, message: &str) {
        let timestamp = self.next_timestamp();
        for observer in &mut self.observers {
            observer.on_error(timestamp, message);
        }
    }

    pub(crate) fn queue_event(&mut self, event: &QueueEvent) {
        for observer in &mut self.observers {
            match event {
                QueueEvent::ActiveTrackReplaced { delta, track } => {
                    observer.on_active_track_replaced(*delta, track.as_ref());
                }
                QueueEvent::PositionInfoChanged => observer.on_position_info_changed(),
                QueueEvent::TimelineChanged => observer.on_timeline_changed(),
            }
        }
    }

    pub(crate) fn track_played(&mut self, track: &Track) {
        for observer in &mut self.observers {
            observer.on_track_played(track);
        }
    }

    pub(crate) fn notification_forced(&mut self) {
        for observer in &mut self.observers {
            observer.on_notification_forced();
        }
    }

    pub(crate) fn open_ui_requested(&mut self) {
        for observer in &mut self.observers {
            observer.on_open_ui_requested();
        }
    }
}
