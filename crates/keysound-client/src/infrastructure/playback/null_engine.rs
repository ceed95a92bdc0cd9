//! Silent audio engine for hosts without an output device.
//!
//! Each session sleeps for the real-time length of its buffer, so worker
//! concurrency and queueing behave as they would with real output.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::trace;

use super::engine::{AudioEngine, AudioError, PcmFormat, PlaybackSession};

/// An [`AudioEngine`] that renders nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudioEngine;

impl NullAudioEngine {
    pub fn new() -> Self {
        Self
    }
}

impl AudioEngine for NullAudioEngine {
    fn acquire(&self) -> Result<Box<dyn PlaybackSession>, AudioError> {
        Ok(Box::new(NullSession { duration: None }))
    }
}

struct NullSession {
    duration: Option<Duration>,
}

impl PlaybackSession for NullSession {
    fn submit(&mut self, pcm: Arc<[u8]>, format: PcmFormat) -> Result<(), AudioError> {
        if self.duration.is_some() {
            return Err(AudioError::AlreadySubmitted);
        }
        self.duration = Some(format.duration_of(pcm.len()));
        Ok(())
    }

    fn wait(&mut self) -> Result<(), AudioError> {
        let duration = self.duration.ok_or(AudioError::NothingSubmitted)?;
        trace!(?duration, "null playback");
        thread::sleep(duration);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
