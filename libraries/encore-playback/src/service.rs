//! Playback worker thread
//!
//! ## Architecture
//!
//! ```text
//! Callers (UI, buttons, focus)        Playback Worker
//!        │                                  │
//!        │  ServiceHandle::send(Message)    │
//!        │─────────────────────────────────>│ Controller::handle
//!        │                                  │ Controller::run_due_timers
//!        │                                  │ (recv_timeout until next timer)
//!        │  ServiceHandle::status()         │
//!        │<──────── Arc<RwLock<Status>> ────│ published after every message
//! ```
//!
//! The worker owns the [`Controller`]. Nothing else touches the queue or the
//! backends, so no lock guards them.

use crate::backend::AudioBackend;
use crate::clock::{Clock, SystemClock};
use crate::commands::Command;
use crate::controller::{Controller, Message};
use crate::error::{PlaybackError, Result};
use crate::events::Observer;
use crate::persistence::PersistenceStore;
use crate::state::PlaybackState;
use crate::types::{AddAux, AddMode, PlaybackConfig};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use encore_core::{MediaLibrary, Query, Track};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error, info};

/// Read-only view published by the worker
#[derive(Debug, Clone, Default)]
pub struct Status {
    /// Playback state
    pub state: PlaybackState,

    /// Current queue track
    pub current_track: Option<Track>,

    /// Index of the current slot
    pub current_pos: usize,

    /// Number of queue slots
    pub queue_len: usize,

    /// Position in the current track
    pub position_ms: u64,
}

impl Status {
    fn capture(controller: &Controller) -> Self {
        Self {
            state: controller.state(),
            current_track: controller.current_track().cloned(),
            current_pos: controller.queue().current_pos(),
            queue_len: controller.queue().len(),
            position_ms: controller.position_ms(),
        }
    }
}

/// One-shot readiness flag
#[derive(Debug, Default)]
struct ReadySignal {
    ready: Mutex<bool>,
    changed: Condvar,
}

impl ReadySignal {
    fn set(&self) {
        *self.ready.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.changed.notify_all();
    }

    fn wait(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        while !*ready {
            ready = self
                .changed
                .wait(ready)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        let (ready, _) = self
            .changed
            .wait_timeout_while(ready, timeout, |ready| !*ready)
            .unwrap_or_else(PoisonError::into_inner);
        *ready
    }
}

/// Cloneable handle to a running [`PlaybackService`]
#[derive(Clone)]
pub struct ServiceHandle {
    tx: Sender<Message>,
    status: Arc<RwLock<Status>>,
    ready: Arc<ReadySignal>,
    worker: ThreadId,
}

impl ServiceHandle {
    /// Post a message to the worker
    pub fn send(&self, message: Message) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| PlaybackError::WorkerStopped)
    }

    /// Post a command to the worker
    pub fn command(&self, command: Command) -> Result<()> {
        self.send(Message::Command(command))
    }

    /// Start or resume playback
    pub fn play(&self) -> Result<()> {
        self.command(Command::Play)
    }

    /// Pause playback
    pub fn pause(&self) -> Result<()> {
        self.command(Command::Pause)
    }

    /// Resolve a query and merge it into the queue
    pub fn add_tracks(&self, query: Query, mode: AddMode, aux: AddAux) -> Result<()> {
        self.send(Message::AddTracks { query, mode, aux })
    }

    /// Block until the worker has restored its state
    ///
    /// Fails instead of deadlocking when called on the worker thread, for
    /// example from inside an [`Observer`].
    pub fn wait_ready(&self) -> Result<()> {
        if thread::current().id() == self.worker {
            return Err(PlaybackError::CalledFromWorker);
        }
        self.ready.wait();
        Ok(())
    }

    /// Like [`ServiceHandle::wait_ready`] with an upper bound; returns whether the worker is ready
    pub fn wait_ready_timeout(&self, timeout: Duration) -> Result<bool> {
        if thread::current().id() == self.worker {
            return Err(PlaybackError::CalledFromWorker);
        }
        Ok(self.ready.wait_timeout(timeout))
    }

    /// Latest published view
    pub fn status(&self) -> Status {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Latest published playback state
    pub fn state(&self) -> PlaybackState {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Latest published current track
    pub fn current_track(&self) -> Option<Track> {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current_track
            .clone()
    }
}

/// Collaborators of a playback service
pub struct ServiceParts {
    /// Timing and feature configuration
    pub config: PlaybackConfig,
    /// Track library
    pub library: Arc<dyn MediaLibrary>,
    /// Active and preload backends
    pub backends: [Box<dyn AudioBackend>; 2],
    /// Snapshot storage
    pub store: Box<dyn PersistenceStore>,
    /// Observers, registered before the initial state is published
    pub observers: Vec<Box<dyn Observer>>,
}

/// Owner of the playback worker thread
///
/// Dropping the service shuts the worker down and waits for it.
pub struct PlaybackService {
    handle: ServiceHandle,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackService {
    /// Spawn the worker on the system clock
    pub fn spawn(parts: ServiceParts) -> Result<Self> {
        Self::spawn_with_clock(parts, Arc::new(SystemClock))
    }

    /// Spawn the worker on a custom clock
    pub fn spawn_with_clock(parts: ServiceParts, clock: Arc<dyn Clock>) -> Result<Self> {
        let (tx, rx) = unbounded();
        let status = Arc::new(RwLock::new(Status::default()));
        let ready = Arc::new(ReadySignal::default());

        let ServiceParts {
            config,
            library,
            backends,
            store,
            observers,
        } = parts;
        let mut controller = Controller::new(
            config,
            library,
            backends,
            store,
            clock.clone(),
            tx.clone(),
        );
        for observer in observers {
            controller.subscribe(observer);
        }

        let worker_status = status.clone();
        let worker_ready = ready.clone();
        let worker = thread::Builder::new()
            .name("encore-playback".to_string())
            .spawn(move || run_worker(controller, rx, clock, worker_status, worker_ready))
            .map_err(|e| PlaybackError::Thread(e.to_string()))?;

        let handle = ServiceHandle {
            tx,
            status,
            ready,
            worker: worker.thread().id(),
        };

        Ok(Self {
            handle,
            worker: Some(worker),
        })
    }

    /// A new handle to the worker
    pub fn handle(&self) -> ServiceHandle {
        self.handle.clone()
    }

    /// Save state, stop the worker and wait for it
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // The worker may already be gone; joining tells
        self.handle.send(Message::Shutdown).ok();
        worker
            .join()
            .map_err(|_| PlaybackError::Thread("playback worker panicked".to_string()))
    }
}

impl Drop for PlaybackService {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Failed to stop playback worker: {}", e);
        }
    }
}

fn publish(controller: &Controller, status: &RwLock<Status>) {
    *status.write().unwrap_or_else(PoisonError::into_inner) = Status::capture(controller);
}

fn run_worker(
    mut controller: Controller,
    rx: Receiver<Message>,
    clock: Arc<dyn Clock>,
    status: Arc<RwLock<Status>>,
    ready: Arc<ReadySignal>,
) {
    debug!("Playback worker started");
    controller.start();
    publish(&controller, &status);
    ready.set();
    info!("Playback ready");

    loop {
        let received = match controller.next_deadline() {
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(clock.now());
                match rx.recv_timeout(timeout) {
                    Ok(message) => Some(message),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(message) => Some(message),
                Err(_) => break,
            },
        };

        let stop = matches!(received, Some(Message::Shutdown));
        if let Some(message) = received {
            controller.handle(message);
        }
        if stop {
            publish(&controller, &status);
            break;
        }

        controller.run_due_timers();
        publish(&controller, &status);
    }

    debug!("Playback worker stopped");
}
