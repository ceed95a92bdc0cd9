//! Reassembly of newline-delimited server commands across socket reads.
//!
//! A TCP read returns whatever bytes happen to have arrived, so a command such
//! as `P10\n` may show up as `P1` in one read and `0\n` in the next.
//! [`LineBuffer`] keeps the unterminated tail of each read and prepends it to
//! the next one, handing out only complete lines.
//!
//! A line that grows past `max_line_len` without a newline is dropped in its
//! entirety, up to and including the newline that eventually ends it.

/// Default upper bound on a single server line, newline excluded.
pub const DEFAULT_MAX_LINE_LEN: usize = 256;

/// Accumulates partial lines between reads.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line_len: usize,
    /// Set while discarding the remainder of an over-long line.
    overflowed: bool,
}

impl LineBuffer {
    /// Creates a buffer that accepts lines of at most `max_line_len` bytes.
    pub fn new(max_line_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_len,
            overflowed: false,
        }
    }

    /// Feeds one read's worth of bytes, calling `on_line` for every line that
    /// is now complete (newline stripped).
    ///
    /// Returns the number of over-long lines discarded during this call.
    pub fn feed(&mut self, bytes: &[u8], mut on_line: impl FnMut(&[u8])) -> usize {
        let mut discarded = 0;
        let mut segments = bytes.split(|&b| b == b'\n').peekable();

        while let Some(segment) = segments.next() {
            let terminated = segments.peek().is_some();

            if !terminated {
                // Unterminated tail: keep it for the next read.
                if self.overflowed {
                    continue;
                }
                if self.pending.len() + segment.len() > self.max_line_len {
                    self.pending.clear();
                    self.overflowed = true;
                } else {
                    self.pending.extend_from_slice(segment);
                }
                continue;
            }

            if self.overflowed {
                self.overflowed = false;
                discarded += 1;
                continue;
            }

            if self.pending.len() + segment.len() > self.max_line_len {
                self.pending.clear();
                discarded += 1;
            } else if self.pending.is_empty() {
                on_line(segment);
            } else {
                self.pending.extend_from_slice(segment);
                on_line(&self.pending);
                self.pending.clear();
            }
        }

        discarded
    }

    /// Returns `true` when part of a line is waiting for its newline.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.overflowed
    }

    /// Drops any partial line.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.overflowed = false;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LEN)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
