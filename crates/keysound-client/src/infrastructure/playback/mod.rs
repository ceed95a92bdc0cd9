//! Playback dispatcher: a fixed pool of worker threads rendering sound lumps.
//!
//! ```text
//! reactor ── play(index) ──▶ [ Work(7) | Work(3) | Shutdown | … ] ──▶ worker 0..N
//!                               crossbeam MPMC queue, unbounded      │
//!                                                                    ▼
//!                                             engine.acquire → submit → wait
//! ```
//!
//! `play` never blocks, so a burst of commands cannot stall key forwarding.
//! Up to N lumps play at once; overlapping sounds layer rather than cut each
//! other off. Requests beyond that wait in the queue.
//!
//! `stop` enqueues one `Shutdown` per worker behind any pending work and joins
//! every thread, so it returns only after the queue has fully drained.

pub mod engine;
pub mod mock;
pub mod null_engine;

#[cfg(feature = "cpal")]
pub mod cpal_engine;

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use keysound_core::{Lump, LumpIndex, WadArchive};
use tracing::{debug, error, info, warn};

use crate::application::play_commands::{DispatchError, PlaybackSink};

pub use engine::{AudioEngine, AudioError, PcmFormat, PlaybackSession, SampleEncoding, LUMP_PCM_FORMAT};
pub use null_engine::NullAudioEngine;

#[cfg(feature = "cpal")]
pub use cpal_engine::CpalAudioEngine;

/// Default number of playback workers.
pub const DEFAULT_WORKERS: usize = 4;

/// One entry in the playback queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackRequest {
    /// Play the lump at this index.
    Work(LumpIndex),
    /// The receiving worker exits.
    Shutdown,
}

/// Owns the playback queue and its worker threads.
pub struct PlaybackDispatcher {
    /// `None` once `stop` has begun.
    queue: Mutex<Option<Sender<PlaybackRequest>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl PlaybackDispatcher {
    /// Spawns `workers` threads that play lumps from `archive` through `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoWorkers`] for a zero worker count and
    /// [`DispatchError::Spawn`] if a thread cannot be created. Threads that
    /// were already running are shut down before the error is returned.
    pub fn start(
        archive: Arc<WadArchive>,
        engine: Arc<dyn AudioEngine>,
        workers: usize,
    ) -> Result<Self, DispatchError> {
        if workers == 0 {
            return Err(DispatchError::NoWorkers);
        }

        let (tx, rx) = unbounded();
        let dispatcher = Self {
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(Vec::with_capacity(workers)),
            worker_count: workers,
        };

        for id in 0..workers {
            let rx = rx.clone();
            let archive = Arc::clone(&archive);
            let engine = Arc::clone(&engine);
            let spawned = thread::Builder::new()
                .name(format!("playback-{id}"))
                .spawn(move || run_worker(id, rx, archive, engine));

            match spawned {
                Ok(handle) => dispatcher.lock_workers().push(handle),
                Err(e) => {
                    // Drop stops whatever did start.
                    return Err(DispatchError::Spawn(e));
                }
            }
        }

        info!(workers, "playback dispatcher started");
        Ok(dispatcher)
    }

    /// Number of worker threads this dispatcher was started with.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Queues `index` for playback without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Stopped`] once [`stop`](Self::stop) has begun.
    pub fn play(&self, index: LumpIndex) -> Result<(), DispatchError> {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = queue.as_ref().ok_or(DispatchError::Stopped)?;
        tx.send(PlaybackRequest::Work(index))
            .map_err(|_| DispatchError::Stopped)
    }

    /// Drains the queue and joins every worker.
    ///
    /// Work queued before this call is still played. Safe to call more than
    /// once; later calls return immediately.
    pub fn stop(&self) {
        let sender = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(tx) = sender else {
            return;
        };

        let handles = std::mem::take(&mut *self.lock_workers());
        debug!(workers = handles.len(), "stopping playback dispatcher");
        for _ in 0..handles.len() {
            // Cannot fail: every worker still holds a receiver until it sees
            // its sentinel.
            let _ = tx.send(PlaybackRequest::Shutdown);
        }
        drop(tx);

        for handle in handles {
            let name = handle.thread().name().unwrap_or("playback").to_string();
            if handle.join().is_err() {
                error!("{name} panicked");
            }
        }
        info!("playback dispatcher stopped");
    }

    /// Returns `true` once [`stop`](Self::stop) has begun.
    pub fn is_stopped(&self) -> bool {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PlaybackSink for PlaybackDispatcher {
    fn play(&self, index: LumpIndex) -> Result<(), DispatchError> {
        PlaybackDispatcher::play(self, index)
    }
}

impl Drop for PlaybackDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    id: usize,
    rx: Receiver<PlaybackRequest>,
    archive: Arc<WadArchive>,
    engine: Arc<dyn AudioEngine>,
) {
    debug!(worker = id, "playback worker started");
    while let Ok(request) = rx.recv() {
        let index = match request {
            PlaybackRequest::Shutdown => break,
            PlaybackRequest::Work(index) => index,
        };

        let Some(lump) = archive.lump(index) else {
            warn!(worker = id, %index, "no such lump; skipping");
            continue;
        };

        if let Err(e) = render(engine.as_ref(), lump) {
            warn!(worker = id, %index, "playback failed: {e}");
        }
    }
    debug!(worker = id, "playback worker exiting");
}

fn render(engine: &dyn AudioEngine, lump: &Lump) -> Result<(), AudioError> {
    let mut session = engine.acquire()?;
    session.submit(Arc::clone(lump.data()), LUMP_PCM_FORMAT)?;
    session.wait()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
