//! Shared fixtures for the controller and service tests
//!
//! `MockBackend` records what the controller asks of it and lets a test fire
//! the completion/error callbacks by hand. `Harness` drives a `Controller`
//! synchronously on a `ManualClock`.

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, Sender};
use encore_core::{InMemoryLibrary, Track};
use encore_playback::{
    AudioBackend, Clock, CompletionCallback, Controller, ErrorCallback, EventForwarder, LoadError,
    ManualClock, MemoryStore, Message, PersistenceStore, PlaybackConfig, PlaybackEvent,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Route tracing output through the test writer (RUST_LOG=encore_playback=trace)
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

// ===== Library =====

pub const TRACK_MS: u64 = 200_000;

pub fn track(id: &str) -> Track {
    Track::new(id, format!("/music/{id}.flac"), format!("Track {id}"))
        .with_duration(Duration::from_millis(TRACK_MS))
}

pub fn library(ids: &[&str]) -> Arc<InMemoryLibrary> {
    Arc::new(InMemoryLibrary::new(ids.iter().map(|id| track(id)).collect()))
}

pub fn numbered_library(count: usize) -> Arc<InMemoryLibrary> {
    Arc::new(InMemoryLibrary::new(
        (0..count).map(|i| track(&format!("t{i}"))).collect(),
    ))
}

pub fn path_of(id: &str) -> PathBuf {
    PathBuf::from(format!("/music/{id}.flac"))
}

// ===== Mock backend =====

#[derive(Default)]
pub struct BackendState {
    pub loaded: Option<PathBuf>,
    pub loads: Vec<PathBuf>,
    pub playing: bool,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub volume: f32,
    pub ducking: bool,
    pub resets: usize,
    completion: Option<CompletionCallback>,
    error: Option<ErrorCallback>,
}

/// Backend whose clones share state, so the test keeps a probe
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<BackendState>>,
    failing: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MockBackend {
    pub fn new(failing: Arc<Mutex<HashSet<PathBuf>>>) -> Self {
        let state = BackendState {
            volume: 1.0,
            ..BackendState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            failing,
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut BackendState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn loaded(&self) -> Option<PathBuf> {
        self.with(|s| s.loaded.clone())
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded() == Some(path_of(id))
    }

    pub fn load_count(&self) -> usize {
        self.with(|s| s.loads.len())
    }

    pub fn set_position(&self, position_ms: u64) {
        self.with(|s| s.position_ms = position_ms);
    }

    /// Fire the completion callback, as a backend does at end of stream
    pub fn complete(&self) {
        self.with(|s| {
            s.playing = false;
            if let Some(callback) = &s.completion {
                callback();
            }
        });
    }

    /// Fire the error callback, as a backend does when playback breaks
    pub fn fail(&self, message: &str) {
        self.with(|s| {
            if let Some(callback) = &s.error {
                callback(message.to_string());
            }
        });
    }
}

impl AudioBackend for MockBackend {
    fn load(&mut self, path: &Path) -> Result<(), LoadError> {
        let broken = self.failing.lock().unwrap().contains(path);
        self.with(|s| {
            s.loads.push(path.to_path_buf());
            s.playing = false;
            s.position_ms = 0;
            if broken {
                s.loaded = None;
                Err(LoadError::NotFound(path.to_path_buf()))
            } else {
                s.loaded = Some(path.to_path_buf());
                Ok(())
            }
        })
    }

    fn play(&mut self) {
        self.with(|s| s.playing = s.loaded.is_some());
    }

    fn pause(&mut self) {
        self.with(|s| s.playing = false);
    }

    fn stop(&mut self) {
        self.with(|s| {
            s.playing = false;
            s.position_ms = 0;
        });
    }

    fn reset(&mut self) {
        self.with(|s| {
            s.loaded = None;
            s.playing = false;
            s.position_ms = 0;
            s.resets += 1;
        });
    }

    fn seek_to(&mut self, position_ms: u64) {
        self.with(|s| s.position_ms = position_ms);
    }

    fn current_position_ms(&self) -> u64 {
        self.with(|s| s.position_ms)
    }

    fn duration_ms(&self) -> Option<u64> {
        self.with(|s| s.duration_ms)
    }

    fn is_playing(&self) -> bool {
        self.with(|s| s.playing)
    }

    fn set_volume_factor(&mut self, factor: f32) {
        self.with(|s| s.volume = factor);
    }

    fn set_ducking(&mut self, ducking: bool) {
        self.with(|s| s.ducking = ducking);
    }

    fn on_completion(&mut self, callback: CompletionCallback) {
        self.with(|s| s.completion = Some(callback));
    }

    fn on_error(&mut self, callback: ErrorCallback) {
        self.with(|s| s.error = Some(callback));
    }
}

/// Two probes plus the backends handed to the controller
pub fn mock_backends() -> (
    [MockBackend; 2],
    [Box<dyn AudioBackend>; 2],
    Arc<Mutex<HashSet<PathBuf>>>,
) {
    let failing = Arc::new(Mutex::new(HashSet::new()));
    let probes = [
        MockBackend::new(failing.clone()),
        MockBackend::new(failing.clone()),
    ];
    let boxed: [Box<dyn AudioBackend>; 2] =
        [Box::new(probes[0].clone()), Box::new(probes[1].clone())];
    (probes, boxed, failing)
}

// ===== Harness =====

pub struct Harness {
    pub controller: Controller,
    pub clock: ManualClock,
    pub backends: [MockBackend; 2],
    pub library: Arc<InMemoryLibrary>,
    pub store: MemoryStore,
    failing: Arc<Mutex<HashSet<PathBuf>>>,
    rx: Receiver<Message>,
    tx: Sender<Message>,
    events: Receiver<PlaybackEvent>,
}

impl Harness {
    pub fn new(library: Arc<InMemoryLibrary>) -> Self {
        Self::with_config(library, PlaybackConfig::default())
    }

    pub fn with_config(library: Arc<InMemoryLibrary>, config: PlaybackConfig) -> Self {
        Self::with_store(library, config, MemoryStore::new())
    }

    pub fn with_store(
        library: Arc<InMemoryLibrary>,
        config: PlaybackConfig,
        store: MemoryStore,
    ) -> Self {
        Self::build(library, config, store.clone(), Box::new(store))
    }

    /// Harness persisting through another store; `store` then stays empty
    pub fn with_persistence(
        library: Arc<InMemoryLibrary>,
        config: PlaybackConfig,
        persistence: Box<dyn PersistenceStore>,
    ) -> Self {
        Self::build(library, config, MemoryStore::new(), persistence)
    }

    fn build(
        library: Arc<InMemoryLibrary>,
        config: PlaybackConfig,
        store: MemoryStore,
        persistence: Box<dyn PersistenceStore>,
    ) -> Self {
        init_tracing();

        let (tx, rx) = unbounded();
        let (events_tx, events) = unbounded();
        let clock = ManualClock::new();
        let (backends, boxed, failing) = mock_backends();

        let mut controller = Controller::new(
            config,
            library.clone(),
            boxed,
            persistence,
            Arc::new(clock.clone()),
            tx.clone(),
        );
        controller.subscribe(Box::new(EventForwarder::new(events_tx)));
        controller.start();

        let mut harness = Self {
            controller,
            clock,
            backends,
            library,
            store,
            failing,
            rx,
            tx,
            events,
        };
        harness.pump();
        harness
    }

    /// Make loading `id` fail from now on
    pub fn break_track(&self, id: &str) {
        self.failing.lock().unwrap().insert(path_of(id));
    }

    /// Handle a message, then everything it caused
    pub fn send(&mut self, message: Message) {
        self.controller.handle(message);
        self.pump();
    }

    /// Handle queued callback messages and due timers until quiet
    pub fn pump(&mut self) {
        loop {
            self.controller.run_due_timers();
            let mut handled = false;
            while let Ok(message) = self.rx.try_recv() {
                self.controller.handle(message);
                handled = true;
            }
            if !handled {
                break;
            }
        }
    }

    /// Move time forward, stopping at every timer on the way
    pub fn advance(&mut self, by: Duration) {
        let target = self.clock.now() + by;
        while let Some(deadline) = self.controller.next_deadline() {
            if deadline > target {
                break;
            }
            let step = deadline.saturating_duration_since(self.clock.now());
            self.clock.advance(step);
            self.pump();
        }
        let rest = target.saturating_duration_since(self.clock.now());
        self.clock.advance(rest);
        self.pump();
    }

    /// Notifications since the last call
    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.events.try_iter().collect()
    }

    /// The backend that holds the current track
    pub fn active(&self) -> &MockBackend {
        let current = self
            .controller
            .current_track()
            .map(|t| t.path.clone())
            .expect("no current track");
        self.backends
            .iter()
            .find(|b| b.loaded().as_ref() == Some(&current))
            .expect("current track not loaded")
    }

    pub fn current_id(&self) -> Option<String> {
        self.controller.current_track().map(|t| t.id.to_string())
    }

    pub fn queue_ids(&self) -> Vec<String> {
        self.controller
            .queue()
            .tracks()
            .iter()
            .map(|t| t.id.to_string())
            .collect()
    }

    pub fn sender(&self) -> Sender<Message> {
        self.tx.clone()
    }
}

pub fn count_state_changes(events: &[PlaybackEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PlaybackEvent::StateChanged { .. }))
        .count()
}

pub fn errors(events: &[PlaybackEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::Error { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}
