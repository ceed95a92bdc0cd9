//! Input event device reader.
//!
//! `/dev/input/event*` nodes are character devices that support `epoll`, so
//! they can be opened with `O_NONBLOCK` and driven by tokio's reactor through
//! [`AsyncFd`]. Each successful read returns whole 24-byte records.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::{unix::AsyncFd, AsyncRead, ReadBuf};

/// An async reader over a non-blocking file descriptor.
///
/// `T` defaults to [`File`]; tests substitute one end of a socket pair.
#[derive(Debug)]
pub struct EventDevice<T: AsRawFd = File> {
    inner: AsyncFd<T>,
}

impl EventDevice<File> {
    /// Opens `path` read-only and non-blocking.
    ///
    /// `path` must be pollable: a character device such as
    /// `/dev/input/event3`, a FIFO or a socket. Linux epoll refuses regular
    /// files, so a recorded event dump cannot be replayed through here; pipe
    /// it through a FIFO instead.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the node cannot be opened (missing, or the
    /// caller lacks permission) or cannot be registered with the runtime.
    /// A regular file fails with `EPERM`.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        Self::new(file)
    }
}

impl<T: AsRawFd> EventDevice<T> {
    /// Wraps an already non-blocking descriptor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(inner: T) -> io::Result<Self> {
        Ok(Self {
            inner: AsyncFd::new(inner)?,
        })
    }

    /// Returns the wrapped descriptor.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }
}

impl<T: AsRawFd + Read + Unpin> AsyncRead for EventDevice<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            let mut guard = ready!(this.inner.poll_read_ready_mut(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|fd| fd.get_mut().read(unfilled)) {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                // Readiness was stale; try_io already cleared it.
                Err(_would_block) => continue,
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
