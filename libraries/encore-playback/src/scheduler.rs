//! Keyed delayed messages
//!
//! Timers are entries in a min-heap ordered by deadline, ties broken by
//! scheduling order. Each entry carries a [`TimerKey`]; scheduling a key
//! again supersedes whatever instance of it is still pending, which gives
//! debouncing and cancellation for free.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

/// Timer identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Load the current track into the active backend
    Load,
    /// Refresh the gapless preload
    Preload,
    /// Write the persistence snapshot
    SaveState,
    /// Skip past a track that failed to load
    AutoSkip,
    /// Inactivity timeout
    IdleTimeout,
    /// One step of the idle fade-out
    FadeStep,
    /// Release backends after a long pause
    Sleep,
    /// Report a finished track as played
    CountPlayed,
    /// Delayed toggle/next waiting for a possible second press
    DelayedAction,
}

struct Entry<T> {
    deadline: Instant,
    seq: u64,
    key: TimerKey,
    payload: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so BinaryHeap pops the earliest deadline first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending timers of the playback worker
pub(crate) struct Scheduler<T> {
    heap: BinaryHeap<Entry<T>>,
    live: HashMap<TimerKey, u64>,
    next_seq: u64,
}

impl<T> Scheduler<T> {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `payload` under `key`, replacing any pending instance
    pub(crate) fn schedule(&mut self, key: TimerKey, deadline: Instant, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert(key, seq);
        self.heap.push(Entry {
            deadline,
            seq,
            key,
            payload,
        });
    }

    /// Cancel the pending instance of `key`, if any
    pub(crate) fn cancel(&mut self, key: TimerKey) -> bool {
        self.live.remove(&key).is_some()
    }

    pub(crate) fn is_scheduled(&self, key: TimerKey) -> bool {
        self.live.contains_key(&key)
    }

    fn is_live(&self, entry: &Entry<T>) -> bool {
        self.live.get(&entry.key) == Some(&entry.seq)
    }

    fn discard_stale(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.is_live(top) {
                break;
            }
            self.heap.pop();
        }
    }

    /// Earliest live deadline
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_stale();
        self.heap.peek().map(|entry| entry.deadline)
    }

    /// Pop the earliest live timer whose deadline is not after `now`
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<(TimerKey, T)> {
        self.discard_stale();
        if self.heap.peek()?.deadline > now {
            return None;
        }
        let entry = self.heap.pop()?;
        self.live.remove(&entry.key);
        Some((entry.key, entry.payload))
    }
}
