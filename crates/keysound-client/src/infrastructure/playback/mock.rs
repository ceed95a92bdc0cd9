//! Recording audio engine for tests and dry runs.
//!
//! Nothing is played. Each session records the buffer it was given, can be
//! made to take a fixed time to "play", and can be made to fail. The engine
//! also tracks how many sessions were alive at once so tests can check the
//! dispatcher's concurrency bound.
//!
//! ```ignore
//! let engine = Arc::new(RecordingAudioEngine::new().with_delay(Duration::from_millis(20)));
//! let dispatcher = PlaybackDispatcher::start(archive, engine.clone(), 2)?;
//! dispatcher.play(LumpIndex(1))?;
//! dispatcher.stop();
//! assert_eq!(engine.completed(), 1);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use super::engine::{AudioEngine, AudioError, PcmFormat, PlaybackSession};

#[derive(Default)]
struct Shared {
    submitted: Mutex<Vec<(Arc<[u8]>, PcmFormat)>>,
    completed: AtomicUsize,
    failed: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

/// An [`AudioEngine`] that records every session instead of playing it.
#[derive(Default)]
pub struct RecordingAudioEngine {
    shared: Arc<Shared>,
    delay: Duration,
    fail_acquire: bool,
    fail_sessions: bool,
}

impl RecordingAudioEngine {
    /// Creates an engine whose sessions complete immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every session take `delay` to complete.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes `acquire` fail.
    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    /// Makes every session's `wait` fail after its delay.
    pub fn failing_sessions(mut self) -> Self {
        self.fail_sessions = true;
        self
    }

    /// Buffers submitted so far, in submission order.
    pub fn submitted(&self) -> Vec<(Arc<[u8]>, PcmFormat)> {
        self.shared
            .submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sessions whose `wait` returned successfully.
    pub fn completed(&self) -> usize {
        self.shared.completed.load(Ordering::SeqCst)
    }

    /// Sessions that failed in `acquire` or `wait`.
    pub fn failed(&self) -> usize {
        self.shared.failed.load(Ordering::SeqCst)
    }

    /// Sessions currently alive.
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Highest number of sessions alive at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.shared.max_active.load(Ordering::SeqCst)
    }
}

impl AudioEngine for RecordingAudioEngine {
    fn acquire(&self) -> Result<Box<dyn PlaybackSession>, AudioError> {
        if self.fail_acquire {
            self.shared.failed.fetch_add(1, Ordering::SeqCst);
            return Err(AudioError::NoOutputDevice);
        }
        let now = self.shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_active.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            shared: Arc::clone(&self.shared),
            delay: self.delay,
            fail: self.fail_sessions,
            submitted: false,
        }))
    }
}

struct RecordingSession {
    shared: Arc<Shared>,
    delay: Duration,
    fail: bool,
    submitted: bool,
}

impl PlaybackSession for RecordingSession {
    fn submit(&mut self, pcm: Arc<[u8]>, format: PcmFormat) -> Result<(), AudioError> {
        if self.submitted {
            return Err(AudioError::AlreadySubmitted);
        }
        self.submitted = true;
        self.shared
            .submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((pcm, format));
        Ok(())
    }

    fn wait(&mut self) -> Result<(), AudioError> {
        if !self.submitted {
            return Err(AudioError::NothingSubmitted);
        }
        thread::sleep(self.delay);
        if self.fail {
            self.shared.failed.fetch_add(1, Ordering::SeqCst);
            return Err(AudioError::Stream("injected failure".into()));
        }
        self.shared.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.shared.active.fetch_sub(1, Ordering::SeqCst);
    }
}
