//! The audio engine boundary.
//!
//! A playback worker renders one lump per session:
//!
//! ```text
//! engine.acquire() -> session
//! session.submit(pcm, format)
//! session.wait()              // blocks until the buffer has been played
//! drop(session)               // releases the output stream
//! ```
//!
//! Sessions are created and used on the worker thread that acquired them, so
//! [`PlaybackSession`] does not require `Send`. Some hosts' output streams
//! cannot leave the thread that built them.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error type for audio output.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The host has no default output device.
    #[error("no audio output device available")]
    NoOutputDevice,
    /// The output device could not be queried or configured.
    #[error("audio device error: {0}")]
    Device(String),
    /// The device prefers a sample format this engine cannot produce.
    #[error("unsupported device sample format: {0}")]
    UnsupportedFormat(String),
    /// The stream failed while playing.
    #[error("audio stream error: {0}")]
    Stream(String),
    /// `submit` was called twice on one session.
    #[error("session already has a buffer")]
    AlreadySubmitted,
    /// `wait` was called before `submit`.
    #[error("session has no buffer to play")]
    NothingSubmitted,
    /// The stream went away without reporting completion.
    #[error("audio stream ended without completing")]
    Interrupted,
}

/// Sample encoding of a PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// Unsigned 8-bit, silence at 128.
    U8,
}

impl SampleEncoding {
    /// Bytes per sample.
    pub fn width(self) -> usize {
        match self {
            SampleEncoding::U8 => 1,
        }
    }
}

/// Layout of a raw PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: SampleEncoding,
}

impl PcmFormat {
    /// Real-time duration of `bytes` bytes of audio in this format.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let frame_width = self.encoding.width() * usize::from(self.channels.max(1));
        let frames = (bytes / frame_width) as u64;
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(frames * 1_000_000 / u64::from(self.sample_rate))
    }
}

/// Format of every sound lump: 8-bit unsigned mono at 11025 Hz.
pub const LUMP_PCM_FORMAT: PcmFormat = PcmFormat {
    sample_rate: 11_025,
    channels: 1,
    encoding: SampleEncoding::U8,
};

/// Produces playback sessions. Shared by all playback workers.
pub trait AudioEngine: Send + Sync {
    /// Opens a session on the output device.
    fn acquire(&self) -> Result<Box<dyn PlaybackSession>, AudioError>;
}

/// One buffer's worth of playback. Dropping the session releases it.
pub trait PlaybackSession {
    /// Starts playing `pcm`.
    fn submit(&mut self, pcm: Arc<[u8]>, format: PcmFormat) -> Result<(), AudioError>;

    /// Blocks until the submitted buffer has finished playing or failed.
    fn wait(&mut self) -> Result<(), AudioError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
