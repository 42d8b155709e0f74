//! Probing audio backend
//!
//! Opens each file with Symphonia to validate it and read its duration, then
//! plays it silently against the wall clock. A small timer thread per backend
//! reports the end of the track the way a real output would.
//!
//! ## Architecture
//!
//! ```text
//! Playback Worker                 End-of-track Thread
//!        │                              │
//!        │  play() / seek_to()          │
//!        │── Arm { generation, after } ─>│
//!        │                              │ recv_timeout(after)
//!        │  pause() / stop() / reset()  │
//!        │── Disarm ───────────────────>│
//!        │                              │
//!        │   completion callback        │
//!        │<─────────────────────────────│ (only if generation still current)
//! ```

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use encore_playback::{AudioBackend, CompletionCallback, ErrorCallback, LoadError};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Probe a file and return its duration in milliseconds, when the container knows it
pub fn probe(path: &Path) -> Result<Option<u64>, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|e| LoadError::Backend(e.to_string()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let unsupported = |reason: String| LoadError::Unsupported {
        path: path.to_path_buf(),
        reason,
    };

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| unsupported(format!("Failed to probe file: {}", e)))?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| unsupported("No audio track".to_string()))?;
    let params = &track.codec_params;

    let duration_ms = match (params.time_base, params.n_frames) {
        (Some(time_base), Some(n_frames)) => {
            let time = time_base.calc_time(n_frames);
            Some(time.seconds * 1000 + (time.frac * 1000.0).round() as u64)
        }
        _ => None,
    };
    Ok(duration_ms)
}

enum TimerRequest {
    Arm { generation: u64, after: Duration },
    Disarm,
}

#[derive(Default)]
struct Shared {
    loaded: Option<PathBuf>,
    duration_ms: Option<u64>,
    /// Position at the last pause or seek
    base_ms: u64,
    /// Set while playing
    started: Option<Instant>,
    /// Bumped whenever a pending end-of-track must no longer fire
    generation: u64,
    completion: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Shared {
    fn position_ms(&self) -> u64 {
        let elapsed = self
            .started
            .map_or(0, |started| started.elapsed().as_millis() as u64);
        let position = self.base_ms + elapsed;
        self.duration_ms.map_or(position, |d| position.min(d))
    }

    /// Freeze the position and invalidate any pending end-of-track
    fn halt(&mut self) {
        self.base_ms = self.position_ms();
        self.started = None;
        self.generation += 1;
    }
}

/// Silent backend driven by probed durations
pub struct ProbeBackend {
    name: String,
    shared: Arc<Mutex<Shared>>,
    timer: Sender<TimerRequest>,
    _timer_thread: JoinHandle<()>,
}

impl ProbeBackend {
    /// Create a backend and its end-of-track thread
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let shared = Arc::new(Mutex::new(Shared::default()));
        let (timer, requests) = unbounded();

        let thread_shared = shared.clone();
        let timer_thread = thread::Builder::new()
            .name(format!("{}-timer", name))
            .spawn(move || Self::timer_thread(requests, thread_shared))?;

        Ok(Self {
            name,
            shared,
            timer,
            _timer_thread: timer_thread,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self, request: TimerRequest) {
        // The thread only goes away together with the backend
        self.timer.send(request).ok();
    }

    fn arm(&self, shared: &Shared) {
        if let (Some(_), Some(duration)) = (shared.started, shared.duration_ms) {
            let remaining = duration.saturating_sub(shared.base_ms);
            self.request(TimerRequest::Arm {
                generation: shared.generation,
                after: Duration::from_millis(remaining),
            });
        }
    }

    /// Wait for arm/disarm requests and fire completions when a deadline passes
    fn timer_thread(requests: Receiver<TimerRequest>, shared: Arc<Mutex<Shared>>) {
        let mut armed: Option<(u64, Instant)> = None;

        loop {
            let request = match armed {
                Some((_, deadline)) => {
                    match requests.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                    {
                        Ok(request) => Some(request),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match requests.recv() {
                    Ok(request) => Some(request),
                    Err(_) => break,
                },
            };

            match request {
                Some(TimerRequest::Arm { generation, after }) => {
                    armed = Some((generation, Instant::now() + after));
                }
                Some(TimerRequest::Disarm) => armed = None,
                None => {
                    if let Some((generation, _)) = armed.take() {
                        Self::finish(&shared, generation);
                    }
                }
            }
        }
    }

    fn finish(shared: &Mutex<Shared>, generation: u64) {
        let callback = {
            let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if shared.generation != generation || shared.started.is_none() {
                return;
            }
            shared.base_ms = shared.duration_ms.unwrap_or(shared.base_ms);
            shared.started = None;
            shared.completion.clone()
        };

        // Called without the lock; the controller's callback only posts a message
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl AudioBackend for ProbeBackend {
    fn load(&mut self, path: &Path) -> Result<(), LoadError> {
        let duration_ms = probe(path)?;

        let mut shared = self.lock();
        shared.halt();
        shared.loaded = Some(path.to_path_buf());
        shared.duration_ms = duration_ms;
        shared.base_ms = 0;
        debug!(
            "[{}] Loaded {} ({:?} ms)",
            self.name,
            path.display(),
            duration_ms
        );
        drop(shared);

        self.request(TimerRequest::Disarm);
        Ok(())
    }

    fn play(&mut self) {
        let mut shared = self.lock();
        if shared.loaded.is_none() || shared.started.is_some() {
            return;
        }
        shared.generation += 1;
        shared.started = Some(Instant::now());
        trace!("[{}] Play from {} ms", self.name, shared.base_ms);
        self.arm(&shared);
    }

    fn pause(&mut self) {
        self.lock().halt();
        self.request(TimerRequest::Disarm);
    }

    fn stop(&mut self) {
        let mut shared = self.lock();
        shared.halt();
        shared.base_ms = 0;
        drop(shared);
        self.request(TimerRequest::Disarm);
    }

    fn reset(&mut self) {
        let mut shared = self.lock();
        shared.halt();
        shared.loaded = None;
        shared.duration_ms = None;
        shared.base_ms = 0;
        drop(shared);
        self.request(TimerRequest::Disarm);
    }

    fn seek_to(&mut self, position_ms: u64) {
        let mut shared = self.lock();
        let playing = shared.started.is_some();
        shared.halt();
        shared.base_ms = shared
            .duration_ms
            .map_or(position_ms, |d| position_ms.min(d));
        if playing {
            shared.started = Some(Instant::now());
            self.arm(&shared);
        }
    }

    fn current_position_ms(&self) -> u64 {
        self.lock().position_ms()
    }

    fn duration_ms(&self) -> Option<u64> {
        self.lock().duration_ms
    }

    fn is_playing(&self) -> bool {
        self.lock().started.is_some()
    }

    fn set_volume_factor(&mut self, factor: f32) {
        trace!("[{}] Volume factor {:.2}", self.name, factor);
    }

    fn set_ducking(&mut self, ducking: bool) {
        trace!("[{}] Ducking {}", self.name, ducking);
    }

    fn on_completion(&mut self, callback: CompletionCallback) {
        self.lock().completion = Some(Arc::from(callback));
    }

    fn on_error(&mut self, _callback: ErrorCallback) {
        // A file that probed fine never fails afterwards
    }
}
