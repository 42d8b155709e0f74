//! Playback timeline
//!
//! A single ordered list of tracks holding history, the current track and the
//! lookahead. Duplicates are allowed: each slot is identified by its track id
//! together with the insertion order tag in [`TrackFlags`].
//!
//! ```text
//!   history        current   lookahead
//! [ A  B  C ]  ->  [ D ]  -> [ E  F ]
//!                   ^ current_pos
//! ```
//!
//! Mutations record what the UI can see (previous, current and next slot,
//! position and length) before they run and compare afterwards. Only the
//! differences are queued as [`QueueEvent`]s for the controller to drain.

use crate::events::QueueEvent;
use crate::shuffle::permutation;
use crate::types::{AddAux, AddMode, FinishAction, ShiftDelta, ShuffleMode};
use encore_core::{MediaLibrary, Query, Track, TrackFlags, TrackId};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tracing::{debug, trace};

/// Default number of entries kept around the current position in random mode
pub const DEFAULT_RANDOM_HISTORY: usize = 20;

/// Highest order tag; bit 31 is reserved for the random-origin mark
const MAX_ORDER: u32 = 0x7fff_ffff;

/// Precomputed wrap-around order, valid while `ticket` matches the queue
#[derive(Debug, Clone)]
struct ShuffleCache {
    ticket: u64,
    order: Vec<usize>,
}

/// What an observer can currently see of the queue
struct Visible {
    prev: Option<Track>,
    current: Option<Track>,
    next: Option<Track>,
    pos: usize,
    len: usize,
}

fn same_slot(a: &Option<Track>, b: &Option<Track>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same_slot(b),
        (None, None) => true,
        _ => false,
    }
}

/// Ordered playback queue with shuffle and finish policies
#[derive(Debug, Clone)]
pub struct TrackQueue {
    tracks: Vec<Track>,
    current_pos: usize,
    shuffle_mode: ShuffleMode,
    finish_action: FinishAction,
    shuffled_cache: Option<ShuffleCache>,
    /// Order tags in the order the user left them when shuffle went on
    unshuffled_order: Vec<u32>,
    next_order: u32,
    random_history: usize,
    pending_events: Vec<QueueEvent>,
    dirty: bool,
}

impl TrackQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::with_random_history(DEFAULT_RANDOM_HISTORY)
    }

    /// Create an empty queue with a custom random-mode history window
    pub fn with_random_history(random_history: usize) -> Self {
        Self {
            tracks: Vec::new(),
            current_pos: 0,
            shuffle_mode: ShuffleMode::None,
            finish_action: FinishAction::Stop,
            shuffled_cache: None,
            unshuffled_order: Vec::new(),
            next_order: 0,
            random_history: random_history.max(1),
            pending_events: Vec::new(),
            dirty: false,
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Index of the current slot
    pub fn current_pos(&self) -> usize {
        self.current_pos
    }

    /// Track in the current slot
    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.current_pos)
    }

    /// All slots in play order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Current shuffle mode
    pub fn shuffle_mode(&self) -> ShuffleMode {
        self.shuffle_mode
    }

    /// Current finish action
    pub fn finish_action(&self) -> FinishAction {
        self.finish_action
    }

    /// Whether the current slot is the last one
    pub fn is_at_last(&self) -> bool {
        self.current_pos + 1 >= self.tracks.len()
    }

    /// Take the buffered notifications
    pub fn drain_events(&mut self) -> Vec<QueueEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Whether the queue changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Resolve a query and merge the results into the queue
    ///
    /// Unfilled tracks are skipped. Returns how many tracks were inserted.
    pub fn add_tracks(
        &mut self,
        library: &dyn MediaLibrary,
        query: &Query,
        mode: AddMode,
        aux: &AddAux,
    ) -> usize {
        let results: Vec<Track> = library
            .query(query)
            .into_iter()
            .filter(Track::is_filled)
            .collect();

        if results.is_empty() {
            debug!("Query {:?} resolved to no playable tracks", query);
            return 0;
        }

        let before = self.visible();

        // The aux match refers to the unshuffled query result
        let first = match aux {
            AddAux::None => None,
            AddAux::Position(index) => (*index < results.len()).then_some(*index),
            AddAux::Id(id) => results.iter().position(|t| &t.id == id),
        };

        if mode.replaces_queue() {
            self.tracks.clear();
            self.current_pos = 0;
            self.next_order = 0;
            self.unshuffled_order.clear();
        }

        let mut block: Vec<Track> = results
            .iter()
            .map(|t| t.with_flags(self.next_flags(false)))
            .collect();
        let first_order = first.map(|index| block[index].flags.order);

        if self.shuffle_mode.is_shuffling() {
            let order = permutation(&block, self.shuffle_mode);
            block = order.iter().map(|&i| block[i].clone()).collect();
        }

        if let Some(order) = first_order {
            if let Some(index) = block.iter().position(|t| t.flags.order == order) {
                block[..=index].rotate_right(1);
            }
        }

        let count = block.len();
        let insert_at = match mode {
            AddMode::Play | AddMode::PlayPosFirst | AddMode::PlayIdFirst => 0,
            AddMode::FlushAndPlayNext => {
                if !self.tracks.is_empty() {
                    self.tracks.truncate(self.current_pos + 1);
                }
                self.tracks.len()
            }
            AddMode::Enqueue | AddMode::EnqueueIdFirst | AddMode::EnqueuePosFirst => {
                if self.finish_action == FinishAction::Random {
                    self.strip_random_lookahead();
                }
                self.tracks.len()
            }
            AddMode::EnqueueAsNext => {
                if self.tracks.is_empty() {
                    0
                } else {
                    self.current_pos + 1
                }
            }
        };

        self.tracks.splice(insert_at..insert_at, block);
        debug!("Added {} tracks ({:?}) at {}", count, mode, insert_at);

        self.timeline_changed();
        self.broadcast(before);
        count
    }

    /// Move the current position
    ///
    /// Returns the new current track, or `None` when there is nothing to move
    /// to (empty queue, or random mode without a random track to append).
    pub fn shift_current(&mut self, library: &dyn MediaLibrary, delta: ShiftDelta) -> Option<Track> {
        let before = self.visible();

        let moved = if delta.is_album() {
            self.shift_album(library, delta.song_step())
        } else if delta == ShiftDelta::Keep {
            true
        } else {
            self.shift_song(library, delta.song_step())
        };

        let current = if moved {
            self.fetch(library, 0)
        } else {
            None
        };

        self.dirty = true;
        self.broadcast(before);
        current
    }

    fn shift_song(&mut self, library: &dyn MediaLibrary, step: i8) -> bool {
        if self.tracks.is_empty() {
            return self.finish_action == FinishAction::Random;
        }

        if step > 0 {
            if self.current_pos + 1 < self.tracks.len() {
                self.current_pos += 1;
            } else if self.finish_action == FinishAction::Random {
                // Appends a random track (and may trim history) before we step onto it
                if self.fetch(library, 1).is_none() {
                    return false;
                }
                self.current_pos += 1;
            } else {
                self.wrap_to_start();
            }
        } else if step < 0 {
            if self.current_pos > 0 {
                self.current_pos -= 1;
            } else if self.finish_action != FinishAction::Random {
                self.current_pos = self.tracks.len() - 1;
            }
        }
        true
    }

    fn shift_album(&mut self, library: &dyn MediaLibrary, step: i8) -> bool {
        let Some(start) = self.current().cloned() else {
            return self.shift_song(library, step);
        };

        // Guard against a queue (or random library) made of a single album
        let mut remaining = self.tracks.len().max(self.random_history) + 1;
        loop {
            if !self.shift_song(library, step) {
                return false;
            }
            remaining -= 1;

            let Some(current) = self.current() else {
                return true;
            };
            if current.album_id != start.album_id || current.id == start.id || remaining == 0 {
                return true;
            }
        }
    }

    fn wrap_to_start(&mut self) {
        if self.shuffle_mode.is_shuffling() {
            let order = self.wrapped_order().to_vec();
            self.tracks = order.iter().map(|&i| self.tracks[i].clone()).collect();
            self.shuffled_cache = None;
            self.timeline_changed();
            trace!("Reshuffled {} tracks on wrap", self.tracks.len());
        }
        self.current_pos = 0;
    }

    /// Look at the previous (-1), current (0) or next (1) track
    ///
    /// Looking one past the end in random mode appends a random library track
    /// and trims old history. Observers see the new next slot and position
    /// info, but the append is not reported as a timeline change.
    pub fn get_track(&mut self, library: &dyn MediaLibrary, delta: i8) -> Option<Track> {
        let before = self.visible();
        let track = self.fetch(library, delta);
        self.broadcast(before);
        track
    }

    /// `get_track` without the diff, for use inside other mutations
    fn fetch(&mut self, library: &dyn MediaLibrary, delta: i8) -> Option<Track> {
        let target = self.current_pos as isize + isize::from(delta);
        if target == self.tracks.len() as isize && self.finish_action == FinishAction::Random {
            return self.append_random(library);
        }
        self.peek(delta)
    }

    /// Non-appending lookup used for previews and diffs
    fn peek(&mut self, delta: i8) -> Option<Track> {
        let len = self.tracks.len();
        let target = self.current_pos as isize + isize::from(delta);

        if target < 0 {
            if self.finish_action == FinishAction::Random {
                return None;
            }
            return self.tracks.last().cloned();
        }

        let target = target as usize;
        if target < len {
            return Some(self.tracks[target].clone());
        }

        if target == len && delta > 0 && len > 0 && self.finish_action != FinishAction::Random {
            // Repeat-all preview: first track of the order used after wrapping
            if self.shuffle_mode.is_shuffling() {
                let first = self.wrapped_order().first().copied();
                return first.and_then(|i| self.tracks.get(i).cloned());
            }
            return self.tracks.first().cloned();
        }

        None
    }

    fn append_random(&mut self, library: &dyn MediaLibrary) -> Option<Track> {
        let track = library.random_track().filter(Track::is_filled)?;
        let flags = self.next_flags(true);
        self.tracks.push(track.with_flags(flags));

        while self.tracks.len() > self.random_history && self.current_pos > 0 {
            self.tracks.remove(0);
            self.current_pos -= 1;
        }

        self.dirty = true;
        trace!("Appended random track, queue length {}", self.tracks.len());
        self.tracks.last().cloned()
    }

    /// Change the shuffle mode, keeping the current track current
    pub fn set_shuffle_mode(&mut self, mode: ShuffleMode) {
        if mode == self.shuffle_mode {
            return;
        }

        if !self.shuffle_mode.is_shuffling() {
            // Restored when shuffle goes off again
            self.unshuffled_order = self.tracks.iter().map(|t| t.flags.order).collect();
        }

        let before = self.visible();
        let current_order = self.current().map(|t| t.flags.order);
        self.shuffle_mode = mode;

        if mode.is_shuffling() {
            let order = permutation(&self.tracks, mode);
            self.tracks = order.iter().map(|&i| self.tracks[i].clone()).collect();
        } else {
            self.unshuffle();
        }
        self.shuffled_cache = None;

        if let Some(order) = current_order {
            if let Some(pos) = self.tracks.iter().position(|t| t.flags.order == order) {
                self.current_pos = pos;
            }
        }

        debug!("Shuffle mode set to {}", mode);
        self.timeline_changed();
        self.broadcast(before);
    }

    /// Change the finish action
    pub fn set_finish_action(&mut self, action: FinishAction) {
        if action == self.finish_action {
            return;
        }

        let before = self.visible();
        self.finish_action = action;
        debug!("Finish action set to {}", action);
        self.dirty = true;
        self.broadcast(before);
    }

    /// Remove the slot at `index`
    pub fn remove_at(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }

        let before = self.visible();
        let removed = self.remove_slot(index);
        self.timeline_changed();
        self.broadcast(before);
        Some(removed)
    }

    /// Remove every slot holding `id`
    ///
    /// Returns the number of removed slots.
    pub fn remove_track(&mut self, id: &TrackId) -> usize {
        let indices: Vec<usize> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| &t.id == id)
            .map(|(i, _)| i)
            .collect();

        if indices.is_empty() {
            return 0;
        }

        let before = self.visible();
        for &index in indices.iter().rev() {
            self.remove_slot(index);
        }
        self.timeline_changed();
        self.broadcast(before);
        indices.len()
    }

    fn remove_slot(&mut self, index: usize) -> Track {
        let removed = self.tracks.remove(index);
        if index < self.current_pos {
            self.current_pos -= 1;
        } else if index == self.current_pos && self.current_pos >= self.tracks.len() {
            // Removed the current track with no lookahead left
            self.current_pos = 0;
        }
        removed
    }

    /// Move the slot at `from` to `to`
    ///
    /// Returns false if either index is out of bounds.
    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        let len = self.tracks.len();
        if from >= len || to >= len {
            return false;
        }
        if from == to {
            return true;
        }

        let before = self.visible();
        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        if from == self.current_pos {
            self.current_pos = to;
        } else if from < self.current_pos && to >= self.current_pos {
            self.current_pos -= 1;
        } else if from > self.current_pos && to <= self.current_pos {
            self.current_pos += 1;
        }

        self.timeline_changed();
        self.broadcast(before);
        true
    }

    /// Drop the lookahead, keeping history and the current track
    pub fn clear_upcoming(&mut self) {
        if self.tracks.len() <= self.current_pos + 1 {
            return;
        }

        let before = self.visible();
        self.tracks.truncate(self.current_pos + 1);
        self.timeline_changed();
        self.broadcast(before);
    }

    /// Remove every slot
    pub fn clear(&mut self) {
        if self.tracks.is_empty() {
            return;
        }

        let before = self.visible();
        self.tracks.clear();
        self.current_pos = 0;
        self.next_order = 0;
        self.unshuffled_order.clear();
        self.timeline_changed();
        self.broadcast(before);
    }

    /// Slot references for persistence
    pub fn snapshot_refs(&self) -> Vec<(TrackId, TrackFlags)> {
        self.tracks.iter().map(|t| (t.id.clone(), t.flags)).collect()
    }

    /// Order tags of the unshuffled queue, empty unless shuffling
    pub fn unshuffled_order(&self) -> &[u32] {
        &self.unshuffled_order
    }

    /// Rebuild the queue from persisted references
    ///
    /// References the library no longer resolves are dropped and the position
    /// is adjusted accordingly. `unshuffled_order` is the saved
    /// [`TrackQueue::unshuffled_order`].
    pub fn restore(
        &mut self,
        library: &dyn MediaLibrary,
        refs: &[(TrackId, TrackFlags)],
        current_pos: usize,
        shuffle_mode: ShuffleMode,
        finish_action: FinishAction,
        unshuffled_order: &[u32],
    ) {
        let before = self.visible();

        let ids: Vec<TrackId> = refs.iter().map(|(id, _)| id.clone()).collect();
        let resolved: HashMap<TrackId, Track> = library
            .query(&Query::Tracks(ids))
            .into_iter()
            .filter(Track::is_filled)
            .map(|t| (t.id.clone(), t))
            .collect();

        let mut pos = current_pos;
        let mut tracks = Vec::with_capacity(refs.len());
        for (index, (id, flags)) in refs.iter().enumerate() {
            match resolved.get(id) {
                Some(track) => tracks.push(track.with_flags(*flags)),
                None => {
                    debug!("Dropping vanished track {} from restored queue", id);
                    if index < current_pos {
                        pos -= 1;
                    }
                }
            }
        }
        if pos >= tracks.len() {
            pos = 0;
        }

        self.next_order = tracks
            .iter()
            .map(|t| t.flags.order + 1)
            .max()
            .unwrap_or(0)
            .min(MAX_ORDER);
        self.tracks = tracks;
        self.current_pos = pos;
        self.shuffle_mode = shuffle_mode;
        self.finish_action = finish_action;
        self.shuffled_cache = None;
        self.unshuffled_order = if shuffle_mode.is_shuffling() {
            unshuffled_order.to_vec()
        } else {
            Vec::new()
        };

        debug!("Restored queue: {} of {} tracks, position {}", self.tracks.len(), refs.len(), pos);
        self.timeline_changed();
        self.broadcast(before);
    }

    fn strip_random_lookahead(&mut self) {
        let pos = self.current_pos;
        let mut index = 0;
        self.tracks.retain(|t| {
            let keep = index <= pos || !t.flags.random_origin;
            index += 1;
            keep
        });
    }

    fn next_flags(&mut self, random_origin: bool) -> TrackFlags {
        let order = self.next_order;
        self.next_order = if order >= MAX_ORDER { 0 } else { order + 1 };
        TrackFlags {
            order,
            random_origin,
        }
    }

    /// Put the slots back in the order they had before shuffling
    ///
    /// Order tags identify slots, so they are never rewritten here. Slots added
    /// while shuffled follow the others in insertion order.
    fn unshuffle(&mut self) {
        let rank: HashMap<u32, usize> = std::mem::take(&mut self.unshuffled_order)
            .into_iter()
            .enumerate()
            .map(|(index, order)| (order, index))
            .collect();
        self.tracks.sort_by_key(|t| {
            (
                rank.get(&t.flags.order).copied().unwrap_or(usize::MAX),
                t.flags.order,
            )
        });
    }

    fn ticket(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.shuffle_mode.hash(&mut hasher);
        for track in &self.tracks {
            track.id.hash(&mut hasher);
            track.flags.order.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Order the queue takes when wrapping past its end
    fn wrapped_order(&mut self) -> &[usize] {
        let ticket = self.ticket();
        let stale = self
            .shuffled_cache
            .as_ref()
            .map_or(true, |cache| cache.ticket != ticket);
        if stale {
            trace!("Rebuilding shuffle cache");
            self.shuffled_cache = Some(ShuffleCache {
                ticket,
                order: permutation(&self.tracks, self.shuffle_mode),
            });
        }
        match &self.shuffled_cache {
            Some(cache) => &cache.order,
            None => &[],
        }
    }

    fn visible(&mut self) -> Visible {
        Visible {
            prev: self.peek(-1),
            current: self.peek(0),
            next: self.peek(1),
            pos: self.current_pos,
            len: self.tracks.len(),
        }
    }

    fn timeline_changed(&mut self) {
        self.dirty = true;
        self.pending_events.push(QueueEvent::TimelineChanged);
    }

    fn broadcast(&mut self, before: Visible) {
        let after = self.visible();

        for (delta, old, new) in [
            (-1, &before.prev, after.prev),
            (0, &before.current, after.current),
            (1, &before.next, after.next),
        ] {
            if !same_slot(old, &new) {
                self.pending_events
                    .push(QueueEvent::ActiveTrackReplaced { delta, track: new });
            }
        }

        if before.pos != after.pos || before.len != after.len {
            self.pending_events.push(QueueEvent::PositionInfoChanged);
        }
    }
}

impl Default for TrackQueue {
    fn default() -> Self {
        Self::new()
    }
}
