//! PlayCommands use case: turns server bytes into playback requests.
//!
//! The server speaks newline-delimited `P<n>` commands. A TCP read may end in
//! the middle of one, so bytes go through a [`LineBuffer`] first and only
//! complete lines are decoded. Each decoded lump index is handed to a
//! [`PlaybackSink`]; the reactor never waits for playback.

use std::sync::Arc;

use keysound_core::{
    decode_server_line,
    protocol::{LineBuffer, DEFAULT_MAX_LINE_LEN},
    LumpIndex,
};
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for playback dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher is stopping or has stopped; no more work is accepted.
    #[error("playback dispatcher has stopped")]
    Stopped,
    /// A dispatcher needs at least one worker.
    #[error("playback worker count must be at least 1")]
    NoWorkers,
    /// A worker thread could not be spawned.
    #[error("failed to spawn playback worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Accepts playback requests without blocking the caller.
///
/// Implemented by the playback dispatcher in the infrastructure layer.
#[cfg_attr(test, mockall::automock)]
pub trait PlaybackSink: Send + Sync {
    /// Queues `index` for playback.
    fn play(&self, index: LumpIndex) -> Result<(), DispatchError>;
}

/// Counters for one batch of routed bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    /// Commands accepted by the sink.
    pub dispatched: u64,
    /// Commands the sink refused.
    pub refused: u64,
    /// Complete lines that were not a valid command.
    pub ignored: u64,
    /// Over-long lines dropped before decoding.
    pub discarded: u64,
}

impl RouteStats {
    /// Adds `other` into `self`.
    pub fn absorb(&mut self, other: RouteStats) {
        self.dispatched += other.dispatched;
        self.refused += other.refused;
        self.ignored += other.ignored;
        self.discarded += other.discarded;
    }
}

/// Reassembles server lines and forwards play commands to a sink.
pub struct CommandRouter {
    lines: LineBuffer,
    sink: Arc<dyn PlaybackSink>,
}

impl CommandRouter {
    /// Creates a router with the default line length limit.
    pub fn new(sink: Arc<dyn PlaybackSink>) -> Self {
        Self::with_max_line_len(sink, DEFAULT_MAX_LINE_LEN)
    }

    /// Creates a router that drops lines longer than `max_line_len`.
    pub fn with_max_line_len(sink: Arc<dyn PlaybackSink>, max_line_len: usize) -> Self {
        Self {
            lines: LineBuffer::new(max_line_len),
            sink,
        }
    }

    /// Feeds one read's worth of bytes and dispatches every complete command.
    ///
    /// Commands are submitted in the order they appear in the stream.
    pub fn route(&mut self, bytes: &[u8]) -> RouteStats {
        let mut stats = RouteStats::default();
        let sink = &self.sink;

        let discarded = self.lines.feed(bytes, |line| match decode_server_line(line) {
            Some(index) => match sink.play(index) {
                Ok(()) => {
                    debug!(%index, "queued playback request");
                    stats.dispatched += 1;
                }
                Err(e) => {
                    warn!(%index, "playback request refused: {e}");
                    stats.refused += 1;
                }
            },
            None => {
                debug!(line = %String::from_utf8_lossy(line), "ignoring server line");
                stats.ignored += 1;
            }
        });

        if discarded > 0 {
            warn!(discarded, "dropped over-long server line");
        }
        stats.discarded = discarded as u64;
        stats
    }

    /// Returns `true` while a partial line is buffered.
    pub fn has_pending(&self) -> bool {
        self.lines.has_pending()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
