//! Playback controller
//!
//! The single owner of the queue, the playback state and both audio backends.
//! Everything that mutates them arrives as a [`Message`] and is handled one
//! at a time; timers are delayed messages in the keyed [`Scheduler`].
//!
//! The controller itself never blocks and never spawns threads. The
//! [`crate::PlaybackService`] drives it from a worker thread; tests drive it
//! directly with a [`crate::ManualClock`].
//!
//! # Backends
//!
//! Two backend slots exist. `active` plays the current track, the other one
//! is primed with the next track so a natural completion can swap slots
//! instead of loading (gapless). Each load installs fresh callbacks tagged
//! with a load id, so completions and errors from a replaced load are
//! recognised as stale and ignored.

use crate::backend::AudioBackend;
use crate::clock::Clock;
use crate::commands::{group_query, Command, DelayedAction};
use crate::events::{Notifier, Observer};
use crate::persistence::{PersistenceStore, Snapshot, SnapshotEntry};
use crate::queue::TrackQueue;
use crate::scheduler::{Scheduler, TimerKey};
use crate::state::PlaybackState;
use crate::types::{AddAux, AddMode, FinishAction, FocusChange, PlaybackConfig, ShiftDelta, ShuffleMode};
use crossbeam_channel::Sender;
use encore_core::{MediaLibrary, Query, Track, TrackId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Deferred seek, applied when its track becomes the loaded track again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSeek {
    /// Track the seek belongs to
    pub track_id: TrackId,

    /// Target position
    pub position_ms: u64,
}

/// Input of the playback worker
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A user command
    Command(Command),

    /// The user interacted without issuing a command (re-arms the idle timer)
    UserActivity,

    /// Resolve a query and merge it into the queue
    AddTracks {
        /// What to add
        query: Query,
        /// How to merge it
        mode: AddMode,
        /// Which result comes first, for the `*First` modes
        aux: AddAux,
    },

    /// Move the current position and load the new current track
    SetCurrentSong(ShiftDelta),

    /// Change the shuffle mode
    SetShuffleMode(ShuffleMode),

    /// Change the finish action
    SetFinishAction(FinishAction),

    /// Remove every slot holding a track
    RemoveTrack(TrackId),

    /// Remove one slot
    RemoveAt(usize),

    /// Move one slot
    MoveTrack {
        /// Current index
        from: usize,
        /// Target index
        to: usize,
    },

    /// Seek the current track
    SeekTo(u64),

    /// Platform audio focus changed
    AudioFocus(FocusChange),

    /// The media library content changed
    LibraryChanged,

    /// Posted by a backend when its track played to the end
    BackendCompleted {
        /// Backend slot
        slot: usize,
        /// Load the completion belongs to
        load_id: u64,
    },

    /// Posted by a backend when playback failed
    BackendError {
        /// Backend slot
        slot: usize,
        /// Load the error belongs to
        load_id: u64,
        /// Backend message
        message: String,
    },

    /// Save state, release the backends and stop the worker
    Shutdown,
}

/// Delayed work, keyed by [`TimerKey`]
#[derive(Debug, Clone)]
enum Timer {
    Load,
    Preload,
    SaveState,
    AutoSkip,
    IdleTimeout,
    FadeStep,
    Sleep,
    CountPlayed(Track),
    Delayed(DelayedAction),
}

impl Timer {
    fn key(&self) -> TimerKey {
        match self {
            Self::Load => TimerKey::Load,
            Self::Preload => TimerKey::Preload,
            Self::SaveState => TimerKey::SaveState,
            Self::AutoSkip => TimerKey::AutoSkip,
            Self::IdleTimeout => TimerKey::IdleTimeout,
            Self::FadeStep => TimerKey::FadeStep,
            Self::Sleep => TimerKey::Sleep,
            Self::CountPlayed(_) => TimerKey::CountPlayed,
            Self::Delayed(_) => TimerKey::DelayedAction,
        }
    }
}

/// What a backend slot holds
#[derive(Debug, Default)]
struct Slot {
    track: Option<Track>,
    load_id: u64,
}

type SlotIdentity = Option<(TrackId, u32)>;

fn slot_identity(track: Option<&Track>) -> SlotIdentity {
    track.map(|t| (t.id.clone(), t.flags.order))
}

/// Playback state machine
pub struct Controller {
    config: PlaybackConfig,
    library: Arc<dyn MediaLibrary>,
    store: Box<dyn PersistenceStore>,
    clock: Arc<dyn Clock>,
    tx: Sender<Message>,

    backends: [Box<dyn AudioBackend>; 2],
    slots: [Slot; 2],
    active: usize,
    next_load_id: u64,

    queue: TrackQueue,
    state: PlaybackState,
    notifier: Notifier,
    scheduler: Scheduler<Timer>,

    notified_state: Option<PlaybackState>,
    notified_track: Option<SlotIdentity>,

    play_on_load: bool,
    pending_seek: Option<PendingSeek>,
    auto_skips: u32,
    retrying: bool,
    resume_on_gain: bool,

    idle_paused_at: Option<Instant>,
    fade_remaining: Option<u32>,
    volume_factor: f32,
}

impl Controller {
    /// Create a controller
    ///
    /// `tx` must feed the same queue the controller is driven from: backend
    /// callbacks post [`Message::BackendCompleted`] and
    /// [`Message::BackendError`] through it.
    pub fn new(
        config: PlaybackConfig,
        library: Arc<dyn MediaLibrary>,
        backends: [Box<dyn AudioBackend>; 2],
        store: Box<dyn PersistenceStore>,
        clock: Arc<dyn Clock>,
        tx: Sender<Message>,
    ) -> Self {
        let queue = TrackQueue::with_random_history(config.random_history);
        Self {
            config,
            library,
            store,
            clock,
            tx,
            backends,
            slots: [Slot::default(), Slot::default()],
            active: 0,
            next_load_id: 0,
            queue,
            state: PlaybackState::default(),
            notifier: Notifier::default(),
            scheduler: Scheduler::new(),
            notified_state: None,
            notified_track: None,
            play_on_load: false,
            pending_seek: None,
            auto_skips: 0,
            retrying: false,
            resume_on_gain: false,
            idle_paused_at: None,
            fade_remaining: None,
            volume_factor: 1.0,
        }
    }

    /// Register an observer
    ///
    /// Observers registered before [`Controller::start`] see the initial state.
    pub fn subscribe(&mut self, observer: Box<dyn Observer>) {
        self.notifier.subscribe(observer);
    }

    /// Restore the saved queue and publish the initial state
    pub fn start(&mut self) {
        match self.store.load() {
            Ok(Some(snapshot)) => {
                self.queue.restore(
                    self.library.as_ref(),
                    &snapshot.refs(),
                    snapshot.current_pos,
                    snapshot.shuffle_mode(),
                    snapshot.finish_action(),
                    &snapshot.unshuffled_order,
                );
                let queue = &self.queue;
                self.pending_seek = snapshot
                    .pending_seek_track_id
                    .filter(|id| queue.tracks().iter().any(|t| &t.id == id))
                    .map(|track_id| PendingSeek {
                        track_id,
                        position_ms: snapshot.pending_seek_ms,
                    });
                if self.pending_seek.is_none() && snapshot.pending_seek_ms > 0 {
                    debug!("Dropped saved position, its track is gone");
                }
                info!("Restored queue with {} tracks", self.queue.len());
            }
            Ok(None) => debug!("No saved queue"),
            Err(e) => warn!("Failed to load saved queue, starting empty: {}", e),
        }
        // Restoring is not a change worth saving
        self.queue.take_dirty();

        if !self.library.is_any_track_available() {
            self.state.set_no_media(true);
        } else if self.queue.current().is_none() {
            self.state.set_empty_queue(true);
        }

        self.flush();
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Current queue track
    pub fn current_track(&self) -> Option<&Track> {
        self.queue.current()
    }

    /// The queue
    pub fn queue(&self) -> &TrackQueue {
        &self.queue
    }

    /// Whether the active backend holds a loaded track
    pub fn is_loaded(&self) -> bool {
        self.slots[self.active].track.is_some()
    }

    /// Track primed in the preload slot
    pub fn preloaded_track(&self) -> Option<&Track> {
        self.slots[1 - self.active].track.as_ref()
    }

    /// Playback position of the active backend
    pub fn position_ms(&self) -> u64 {
        if self.is_loaded() {
            self.backends[self.active].current_position_ms()
        } else {
            self.pending_seek.as_ref().map_or(0, |seek| seek.position_ms)
        }
    }

    /// Deferred seek waiting for its track
    pub fn pending_seek(&self) -> Option<&PendingSeek> {
        self.pending_seek.as_ref()
    }

    /// When the idle fade-out paused playback, if it did and the grace period is open
    pub fn idle_paused_at(&self) -> Option<Instant> {
        self.idle_paused_at
    }

    /// Current output volume factor (lowered during an idle fade)
    pub fn volume_factor(&self) -> f32 {
        self.volume_factor
    }

    /// Consecutive automatic skips since the last successful load
    pub fn auto_skips(&self) -> u32 {
        self.auto_skips
    }

    /// Earliest pending timer
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Process one message
    pub fn handle(&mut self, message: Message) {
        trace!("Handling {:?}", message);

        match message {
            Message::Command(command) => {
                let resumed = self.user_action();
                self.execute(command, resumed);
            }
            Message::UserActivity => {
                self.user_action();
            }
            Message::AddTracks { query, mode, aux } => {
                self.user_action();
                self.add_tracks(&query, mode, &aux);
            }
            Message::SetCurrentSong(delta) => {
                self.user_action();
                let autoplay = self.state.playing();
                self.set_current_song(delta, autoplay);
            }
            Message::SetShuffleMode(mode) => {
                self.user_action();
                self.queue.set_shuffle_mode(mode);
            }
            Message::SetFinishAction(action) => {
                self.user_action();
                self.queue.set_finish_action(action);
            }
            Message::RemoveTrack(id) => {
                self.user_action();
                self.edit_queue(|queue| {
                    queue.remove_track(&id);
                });
            }
            Message::RemoveAt(index) => {
                self.user_action();
                self.edit_queue(|queue| {
                    queue.remove_at(index);
                });
            }
            Message::MoveTrack { from, to } => {
                self.user_action();
                self.edit_queue(|queue| {
                    queue.move_track(from, to);
                });
            }
            Message::SeekTo(position_ms) => {
                self.user_action();
                self.seek_to(position_ms);
            }
            Message::AudioFocus(change) => self.audio_focus(change),
            Message::LibraryChanged => self.library_changed(),
            Message::BackendCompleted { slot, load_id } => self.on_completion(slot, load_id),
            Message::BackendError {
                slot,
                load_id,
                message,
            } => self.on_backend_error(slot, load_id, &message),
            Message::Shutdown => self.shutdown(),
        }

        self.flush();
    }

    /// Fire every timer that is due
    pub fn run_due_timers(&mut self) {
        while let Some((key, timer)) = self.scheduler.pop_due(self.clock.now()) {
            trace!("Timer {:?} fired", key);
            self.fire(timer);
            self.flush();
        }
    }

    fn execute(&mut self, command: Command, resumed: bool) {
        match command {
            // The idle grace resume already answered these
            Command::PlayPause | Command::Play | Command::DelayedToggle if resumed => {}
            Command::PlayPause => self.play_pause(),
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::NextSong { autoplay } => {
                let autoplay = autoplay || self.state.playing();
                self.set_current_song(ShiftDelta::NextSong, autoplay);
            }
            Command::PreviousSong { autoplay } => self.rewind_or_previous(autoplay),
            Command::CycleShuffle => {
                let mode = self.queue.shuffle_mode().cycled();
                self.queue.set_shuffle_mode(mode);
            }
            Command::CycleRepeat => {
                let action = self.queue.finish_action().cycled();
                self.queue.set_finish_action(action);
            }
            Command::ClearQueue => self.queue.clear_upcoming(),
            Command::EmptyQueue => self.empty_queue(),
            Command::SeekForward(step) => self.seek_by(i64::from(step)),
            Command::SeekBackward(step) => self.seek_by(-i64::from(step)),
            Command::EnqueueFrom(track, group) => {
                let query = group_query(&track, group);
                self.add_tracks(&query, AddMode::Enqueue, &AddAux::None);
            }
            Command::DelayedToggle => self.delayed_press(DelayedAction::Toggle),
            Command::DelayedNext => self.delayed_press(DelayedAction::Next),
        }
    }

    fn fire(&mut self, timer: Timer) {
        match timer {
            Timer::Load => self.load_current(),
            Timer::Preload => self.refresh_preload(),
            Timer::SaveState => self.save(),
            Timer::AutoSkip => {
                debug!("Auto-skipping after load failure ({})", self.auto_skips);
                self.set_current_song(ShiftDelta::NextSong, true);
            }
            Timer::IdleTimeout => self.begin_fade(),
            Timer::FadeStep => self.fade_step(),
            Timer::Sleep => self.enter_sleep(),
            Timer::CountPlayed(track) => self.notifier.track_played(&track),
            Timer::Delayed(DelayedAction::Toggle) => self.play_pause(),
            Timer::Delayed(DelayedAction::Next) => {
                let autoplay = self.state.playing();
                self.set_current_song(ShiftDelta::NextSong, autoplay);
            }
        }
    }

    fn schedule(&mut self, timer: Timer, delay: Duration) {
        let deadline = self.clock.now() + delay;
        self.scheduler.schedule(timer.key(), deadline, timer);
    }

    /// Forward queue diffs, schedule saves and publish state and track changes
    fn flush(&mut self) {
        for event in self.queue.drain_events() {
            self.notifier.queue_event(&event);
        }

        if self.queue.take_dirty() {
            self.schedule(Timer::SaveState, PlaybackConfig::ms(self.config.save_debounce_ms));
            self.schedule(Timer::Preload, PlaybackConfig::ms(self.config.preload_debounce_ms));
        }

        self.state.set_shuffle_mode(self.queue.shuffle_mode());
        self.state.set_finish_action(self.queue.finish_action());

        if self.notified_state != Some(self.state) {
            self.notified_state = Some(self.state);
            self.notifier.state_changed(self.state);
        }

        let current = slot_identity(self.queue.current());
        if self.notified_track.as_ref() != Some(&current) {
            self.notified_track = Some(current);
            self.notifier.track_changed(self.queue.current());
        }
    }

    // ---- transport ----

    fn play_pause(&mut self) {
        if self.state.playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    fn play(&mut self) {
        self.resume_on_gain = false;

        if self.state.empty_queue() {
            info!("Queue is empty, switching to random playback");
            self.queue.set_finish_action(FinishAction::Random);
            self.set_current_song(ShiftDelta::Keep, true);
        }

        if self.queue.current().is_none() {
            return;
        }

        self.scheduler.cancel(TimerKey::Sleep);
        self.state.set_playing(true);

        if self.is_loaded() && !self.state.error() {
            let backend = &mut self.backends[self.active];
            if !backend.is_playing() {
                backend.play();
            }
        } else if self.scheduler.is_scheduled(TimerKey::Load) {
            self.play_on_load = true;
        } else {
            self.schedule_load(true);
        }

        self.arm_idle_timer();
    }

    fn pause(&mut self) {
        self.resume_on_gain = false;
        self.pause_playback();
    }

    /// Pause without touching the transient-loss resume flag
    fn pause_playback(&mut self) {
        self.state.set_playing(false);
        if self.state.ducking() {
            self.state.set_ducking(false);
            self.backends[self.active].set_ducking(false);
        }
        self.play_on_load = false;

        self.scheduler.cancel(TimerKey::IdleTimeout);
        self.cancel_fade();

        if self.is_loaded() {
            self.backends[self.active].pause();
            self.schedule(Timer::Sleep, PlaybackConfig::ms(self.config.sleep_after_ms));
        }
    }

    /// Move the queue and load whatever becomes current
    fn set_current_song(&mut self, delta: ShiftDelta, autoplay: bool) {
        if self.is_loaded() {
            self.backends[self.active].stop();
            self.slots[self.active].track = None;
        }

        match self.queue.shift_current(self.library.as_ref(), delta) {
            None => {
                self.play_on_load = false;
                self.scheduler.cancel(TimerKey::Load);
                if self.library.is_any_track_available() {
                    if self.queue.finish_action() == FinishAction::Random {
                        self.state.set_error(true);
                    } else {
                        self.state.set_empty_queue(true);
                    }
                    self.state.set_no_media(false);
                } else {
                    self.state.set_no_media(true);
                    self.state.set_empty_queue(false);
                }
                debug!("No current track after {:?}", delta);
            }
            Some(track) => {
                self.state.set_no_media(false);
                self.state.set_empty_queue(false);
                debug!("Current track is now {} ({:?})", track.title, delta);

                if self.try_swap_to_preloaded() {
                    self.on_loaded(autoplay);
                } else {
                    self.schedule_load(autoplay);
                }
            }
        }
    }

    fn schedule_load(&mut self, autoplay: bool) {
        self.play_on_load = autoplay;
        self.schedule(Timer::Load, Duration::ZERO);
    }

    fn install_callbacks(&mut self, slot: usize) -> u64 {
        self.next_load_id += 1;
        let load_id = self.next_load_id;
        self.slots[slot].load_id = load_id;

        let tx = self.tx.clone();
        self.backends[slot].on_completion(Box::new(move || {
            tx.send(Message::BackendCompleted { slot, load_id }).ok();
        }));
        let tx = self.tx.clone();
        self.backends[slot].on_error(Box::new(move |message| {
            tx.send(Message::BackendError {
                slot,
                load_id,
                message,
            })
            .ok();
        }));

        load_id
    }

    fn load_current(&mut self) {
        let autoplay = std::mem::take(&mut self.play_on_load);
        let Some(track) = self.queue.current().cloned() else {
            return;
        };

        let already_loaded = self.slots[self.active]
            .track
            .as_ref()
            .is_some_and(|loaded| loaded.same_slot(&track));
        if already_loaded || self.try_swap_to_preloaded() {
            self.on_loaded(autoplay);
            return;
        }

        let slot = self.active;
        self.install_callbacks(slot);
        match self.backends[slot].load(&track.path) {
            Ok(()) => {
                info!("Loaded {} ({})", track.title, track.path.display());
                self.slots[slot].track = Some(track);
                self.on_loaded(autoplay);
            }
            Err(e) => {
                self.slots[slot].track = None;
                self.on_load_failed(&track, &e.to_string(), autoplay);
            }
        }
    }

    /// Make the preload slot active if it holds the current queue slot
    fn try_swap_to_preloaded(&mut self) -> bool {
        let preload = 1 - self.active;
        let matches = match (&self.slots[preload].track, self.queue.current()) {
            (Some(primed), Some(current)) => primed.same_slot(current),
            _ => false,
        };
        if !matches {
            return false;
        }

        let finished = self.active;
        self.backends[finished].reset();
        self.slots[finished].track = None;
        self.active = preload;
        debug!("Gapless hand-off to backend slot {}", preload);
        true
    }

    fn on_loaded(&mut self, autoplay: bool) {
        self.auto_skips = 0;
        self.retrying = false;
        self.state.set_error(false);

        let current_id = self.slots[self.active].track.as_ref().map(|t| t.id.clone());
        let backend = &mut self.backends[self.active];
        backend.set_volume_factor(self.volume_factor);
        backend.set_ducking(self.state.ducking());

        let seek_ms = match &self.pending_seek {
            Some(seek) if current_id.as_ref() == Some(&seek.track_id) => Some(seek.position_ms),
            _ => None,
        };
        if let Some(position_ms) = seek_ms {
            debug!("Applying pending seek to {} ms", position_ms);
            backend.seek_to(position_ms);
            self.pending_seek = None;
        }

        if autoplay {
            self.state.set_playing(true);
        }

        let backend = &mut self.backends[self.active];
        if self.state.playing() {
            if !backend.is_playing() {
                backend.play();
            }
            self.scheduler.cancel(TimerKey::Sleep);
            self.arm_idle_timer();
        } else if backend.is_playing() {
            backend.pause();
        }

        self.schedule(Timer::Preload, PlaybackConfig::ms(self.config.preload_debounce_ms));
    }

    fn on_load_failed(&mut self, track: &Track, reason: &str, autoplay: bool) {
        warn!("Failed to load {}: {}", track.path.display(), reason);

        let wanted = autoplay || self.state.playing() || self.retrying;
        self.state.set_error(true);
        self.notifier
            .error(&format!("Cannot play \"{}\": {}", track.title, reason));

        if !wanted {
            return;
        }

        if self.auto_skips < self.config.max_auto_skips {
            self.auto_skips += 1;
            self.retrying = true;
            self.schedule(Timer::AutoSkip, PlaybackConfig::ms(self.config.auto_skip_delay_ms));
        } else {
            self.retrying = false;
            warn!(
                "Giving up after {} consecutive tracks failed to load",
                self.auto_skips
            );
        }
    }

    fn refresh_preload(&mut self) {
        if !self.config.gapless {
            return;
        }

        let next = match self.queue.finish_action() {
            FinishAction::RepeatCurrent => None,
            FinishAction::Stop if self.queue.is_at_last() => None,
            _ if self.queue.current().is_none() => None,
            _ => self.queue.get_track(self.library.as_ref(), 1),
        };

        let slot = 1 - self.active;
        match next {
            Some(track) => {
                let primed = self.slots[slot]
                    .track
                    .as_ref()
                    .is_some_and(|t| t.same_slot(&track));
                if primed {
                    return;
                }

                self.install_callbacks(slot);
                match self.backends[slot].load(&track.path) {
                    Ok(()) => {
                        debug!("Preloaded {}", track.title);
                        self.slots[slot].track = Some(track);
                    }
                    Err(e) => {
                        // Reported properly once the track becomes current
                        debug!("Preload of {} failed: {}", track.path.display(), e);
                        self.slots[slot].track = None;
                    }
                }
            }
            None => self.release_slot(slot),
        }
    }

    fn release_slot(&mut self, slot: usize) {
        if self.slots[slot].track.take().is_some() {
            self.backends[slot].reset();
        }
    }

    fn on_completion(&mut self, slot: usize, load_id: u64) {
        if slot != self.active || self.slots[slot].load_id != load_id {
            trace!("Ignoring stale completion from slot {}", slot);
            return;
        }
        let Some(finished) = self.slots[slot].track.clone() else {
            return;
        };

        debug!("Finished {}", finished.title);
        self.schedule(
            Timer::CountPlayed(finished),
            PlaybackConfig::ms(self.config.count_played_delay_ms),
        );

        match self.queue.finish_action() {
            FinishAction::RepeatCurrent => {
                let backend = &mut self.backends[self.active];
                backend.seek_to(0);
                backend.play();
            }
            FinishAction::Stop if self.queue.is_at_last() => {
                info!("Reached end of queue");
                self.backends[self.active].stop();
                self.pause_playback();
            }
            _ => self.set_current_song(ShiftDelta::NextSong, true),
        }
    }

    fn on_backend_error(&mut self, slot: usize, load_id: u64, message: &str) {
        if self.slots.get(slot).map_or(true, |s| s.load_id != load_id) {
            trace!("Ignoring stale error from slot {}", slot);
            return;
        }

        if slot == self.active {
            if let Some(track) = self.slots[slot].track.take() {
                self.on_load_failed(&track, message, false);
            }
        } else {
            debug!("Preloaded backend failed: {}", message);
            self.release_slot(slot);
        }
    }

    fn rewind_or_previous(&mut self, autoplay: bool) {
        if self.is_loaded() {
            let threshold = self.config.rewind_threshold_ms;
            let played = self.backends[self.active].current_position_ms();
            let duration = self.active_duration().unwrap_or(0);

            if played > threshold && duration > 2 * threshold {
                debug!("Restarting track after {} ms", played);
                self.backends[self.active].seek_to(0);
                if played as f32 >= duration as f32 * self.config.played_fraction {
                    if let Some(track) = self.slots[self.active].track.clone() {
                        self.notifier.track_played(&track);
                    }
                }
                if autoplay {
                    self.play();
                }
                return;
            }
        }

        let autoplay = autoplay || self.state.playing();
        self.set_current_song(ShiftDelta::PreviousSong, autoplay);
    }

    fn active_duration(&self) -> Option<u64> {
        self.backends[self.active].duration_ms().or_else(|| {
            self.slots[self.active]
                .track
                .as_ref()
                .and_then(|t| t.duration_ms)
        })
    }

    fn seek_to(&mut self, position_ms: u64) {
        let Some(track) = self.queue.current() else {
            return;
        };

        if self.is_loaded() {
            let target = self
                .active_duration()
                .map_or(position_ms, |duration| position_ms.min(duration));
            self.backends[self.active].seek_to(target);
        } else {
            self.pending_seek = Some(PendingSeek {
                track_id: track.id.clone(),
                position_ms,
            });
        }
    }

    fn seek_by(&mut self, step_seconds: i64) {
        let current = self.position_ms() as i64;
        let mut target = (current + step_seconds * 1000).max(0) as u64;
        if let Some(duration) = self.active_duration() {
            target = target.min(duration);
        }
        self.seek_to(target);
    }

    // ---- queue edits ----

    fn add_tracks(&mut self, query: &Query, mode: AddMode, aux: &AddAux) {
        let before = slot_identity(self.queue.current());
        let added = self
            .queue
            .add_tracks(self.library.as_ref(), query, mode, aux);
        if added == 0 {
            return;
        }

        if mode.replaces_queue() {
            self.set_current_song(ShiftDelta::Keep, true);
        } else if slot_identity(self.queue.current()) != before {
            let autoplay = self.state.playing();
            self.set_current_song(ShiftDelta::Keep, autoplay);
        }
    }

    /// Run a queue edit and reload if it replaced the current track
    fn edit_queue(&mut self, edit: impl FnOnce(&mut TrackQueue)) {
        let before = slot_identity(self.queue.current());
        edit(&mut self.queue);
        if slot_identity(self.queue.current()) != before {
            let autoplay = self.state.playing();
            self.set_current_song(ShiftDelta::Keep, autoplay);
        }
    }

    fn empty_queue(&mut self) {
        self.release_slot(self.active);
        self.release_slot(1 - self.active);
        self.pending_seek = None;
        self.queue.clear();
        self.set_current_song(ShiftDelta::Keep, false);
    }

    fn library_changed(&mut self) {
        self.library.invalidate();

        if self.library.is_any_track_available() {
            if self.state.no_media() {
                info!("Library has playable tracks again");
                self.state.set_no_media(false);
                if self.queue.current().is_none() {
                    self.state.set_empty_queue(true);
                }
            }
        } else {
            info!("Library has no playable tracks");
            self.pause_playback();
            self.state.set_no_media(true);
        }
    }

    // ---- audio focus ----

    fn audio_focus(&mut self, change: FocusChange) {
        debug!("Audio focus: {:?}", change);
        match change {
            FocusChange::LossTransient { can_duck: true } => {
                if self.state.playing() {
                    self.state.set_ducking(true);
                    self.backends[self.active].set_ducking(true);
                }
            }
            FocusChange::LossTransient { can_duck: false } => {
                if self.state.playing() {
                    self.resume_on_gain = true;
                    self.pause_playback();
                    self.notifier.notification_forced();
                }
            }
            FocusChange::Loss => {
                let was_playing = self.state.playing();
                self.resume_on_gain = false;
                self.pause_playback();
                if was_playing {
                    self.notifier.notification_forced();
                }
            }
            FocusChange::Gain => {
                if self.state.ducking() {
                    self.state.set_ducking(false);
                    self.backends[self.active].set_ducking(false);
                }
                if std::mem::take(&mut self.resume_on_gain) {
                    self.play();
                }
            }
        }
    }

    // ---- idle timeout ----

    /// Returns true if the action resumed an idle pause
    fn user_action(&mut self) -> bool {
        self.cancel_fade();

        let mut resumed = false;
        if let Some(paused_at) = self.idle_paused_at.take() {
            let idle_for = self.clock.now().saturating_duration_since(paused_at);
            if idle_for <= PlaybackConfig::ms(self.config.idle_grace_ms) {
                info!("User returned after {:?}, resuming", idle_for);
                self.play();
                resumed = true;
            } else {
                debug!("Idle grace period over ({:?}), staying paused", idle_for);
            }
        }

        self.arm_idle_timer();
        resumed
    }

    fn arm_idle_timer(&mut self) {
        match self.config.idle_timeout() {
            Some(timeout) if self.state.playing() => self.schedule(Timer::IdleTimeout, timeout),
            _ => {
                self.scheduler.cancel(TimerKey::IdleTimeout);
            }
        }
    }

    fn fade_steps(&self) -> u32 {
        (1.0 / self.config.fade_step.max(0.001)).ceil() as u32
    }

    fn begin_fade(&mut self) {
        if !self.state.playing() {
            return;
        }
        info!("Idle timeout, fading out");
        self.fade_remaining = Some(self.fade_steps());
        self.schedule(
            Timer::FadeStep,
            PlaybackConfig::ms(self.config.fade_step_interval_ms),
        );
    }

    fn fade_step(&mut self) {
        let Some(remaining) = self.fade_remaining else {
            return;
        };

        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.set_volume(0.0);
            self.pause_playback();
            self.idle_paused_at = Some(self.clock.now());
            info!("Paused after idle fade-out");
            return;
        }

        self.fade_remaining = Some(remaining);
        self.set_volume(remaining as f32 / self.fade_steps() as f32);
        self.schedule(
            Timer::FadeStep,
            PlaybackConfig::ms(self.config.fade_step_interval_ms),
        );
    }

    /// Stop a running fade and restore full volume
    fn cancel_fade(&mut self) {
        self.scheduler.cancel(TimerKey::FadeStep);
        self.fade_remaining = None;
        if self.volume_factor < 1.0 {
            self.set_volume(1.0);
        }
    }

    fn set_volume(&mut self, factor: f32) {
        self.volume_factor = factor;
        self.backends[self.active].set_volume_factor(factor);
    }

    // ---- double press ----

    fn delayed_press(&mut self, action: DelayedAction) {
        if self.scheduler.cancel(TimerKey::DelayedAction) {
            debug!("Double press, opening UI");
            self.notifier.open_ui_requested();
        } else {
            self.schedule(
                Timer::Delayed(action),
                PlaybackConfig::ms(self.config.double_press_window_ms),
            );
        }
    }

    // ---- sleep and persistence ----

    fn enter_sleep(&mut self) {
        if self.state.playing() || !self.is_loaded() {
            return;
        }

        if let Some(track) = self.slots[self.active].track.as_ref() {
            self.pending_seek = Some(PendingSeek {
                track_id: track.id.clone(),
                position_ms: self.backends[self.active].current_position_ms(),
            });
        }
        self.release_slot(self.active);
        self.release_slot(1 - self.active);
        info!("Paused for a while, released audio backends");
    }

    /// Snapshot of the queue, modes and resume position
    pub fn snapshot(&self) -> Snapshot {
        let pending = match self.slots[self.active].track.as_ref() {
            Some(track) => Some(PendingSeek {
                track_id: track.id.clone(),
                position_ms: self.backends[self.active].current_position_ms(),
            }),
            None => self.pending_seek.clone(),
        };

        Snapshot {
            pending_seek_ms: pending.as_ref().map_or(0, |seek| seek.position_ms),
            pending_seek_track_id: pending.map(|seek| seek.track_id),
            tracks: self
                .queue
                .snapshot_refs()
                .into_iter()
                .map(|(id, flags)| SnapshotEntry {
                    id,
                    flags: flags.to_bits(),
                })
                .collect(),
            current_pos: self.queue.current_pos(),
            state_bits: self.state.to_bits(),
            unshuffled_order: self.queue.unshuffled_order().to_vec(),
        }
    }

    fn save(&mut self) {
        let snapshot = self.snapshot();
        if let Err(e) = self.store.save(&snapshot) {
            warn!("Failed to save queue: {}", e);
        }
    }

    fn shutdown(&mut self) {
        info!("Shutting down playback");
        self.scheduler.cancel(TimerKey::SaveState);
        self.save();
        self.pause_playback();
        self.scheduler.cancel(TimerKey::Sleep);
        self.release_slot(self.active);
        self.release_slot(1 - self.active);
    }
}
