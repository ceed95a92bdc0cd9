//! The client reactor: one task multiplexing the input device, the server
//! connection and a shutdown tick.
//!
//! ```text
//! Disconnected ─▶ Connecting ─▶ Connected ─▶ Closing ─▶ Closed
//!                     │                                   ▲
//!                     └──────────── open/connect fails ───┘
//! ```
//!
//! Each loop iteration waits for whichever comes first:
//!
//! - **device readable** – read one 24-byte record, classify it and, for a
//!   press or release, write one 2-byte frame to the server;
//! - **server readable** – feed the bytes to the command router, which queues
//!   playback without waiting for it;
//! - **tick** – check the shared `running` flag so Ctrl-C is noticed even
//!   when nothing else happens.
//!
//! Any I/O failure, a short device read, a short write or the peer closing
//! ends the loop. Cleanup then runs exactly once, whichever path was taken.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keysound_core::protocol::{FRAME_SIZE, INPUT_EVENT_SIZE};
use keysound_core::InputEvent;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::application::forward_keys::{forward_key_event, KeyDecision};
use crate::application::play_commands::{CommandRouter, PlaybackSink, RouteStats};
use crate::infrastructure::device::EventDevice;

/// Errors that end a reactor session.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// The input device could not be opened.
    #[error("failed to open input device {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The TCP connection to the server could not be established.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// The device returned less than one whole record (0 means end of file).
    #[error("short read from input device: got {got} of 24 bytes")]
    DeviceShortRead { got: usize },
    /// Reading the device failed.
    #[error("input device read error: {0}")]
    DeviceRead(#[source] std::io::Error),
    /// Reading from the server failed.
    #[error("network read error: {0}")]
    NetworkRead(#[source] std::io::Error),
    /// Fewer than 2 bytes of a frame were written.
    #[error("short write to server: sent {sent} of 2 bytes")]
    ShortWrite { sent: usize },
    /// Writing to the server failed.
    #[error("network write error: {0}")]
    NetworkWrite(#[source] std::io::Error),
    /// `run` was called in a state other than `Connected`.
    #[error("reactor is not connected (state: {0})")]
    NotConnected(ReactorState),
}

/// Lifecycle of a reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

impl fmt::Display for ReactorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReactorState::Disconnected => "disconnected",
            ReactorState::Connecting => "connecting",
            ReactorState::Connected => "connected",
            ReactorState::Closing => "closing",
            ReactorState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why a session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The server closed the connection.
    PeerClosed,
    /// The `running` flag was cleared.
    ShutdownRequested,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::PeerClosed => f.write_str("server closed the connection"),
            Termination::ShutdownRequested => f.write_str("shutdown requested"),
        }
    }
}

/// Counters accumulated over one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames written to the server.
    pub frames_sent: u64,
    /// Presses and releases whose code did not fit in a frame.
    pub keys_skipped: u64,
    /// Playback requests accepted by the sink.
    pub commands_dispatched: u64,
    /// Playback requests the sink refused.
    pub commands_refused: u64,
    /// Complete server lines that were not a command.
    pub lines_ignored: u64,
    /// Over-long server lines dropped unread.
    pub lines_discarded: u64,
}

impl SessionStats {
    fn absorb_route(&mut self, route: RouteStats) {
        self.commands_dispatched += route.dispatched;
        self.commands_refused += route.refused;
        self.lines_ignored += route.ignored;
        self.lines_discarded += route.discarded;
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames_sent={} keys_skipped={} commands_dispatched={} commands_refused={} \
             lines_ignored={} lines_discarded={}",
            self.frames_sent,
            self.keys_skipped,
            self.commands_dispatched,
            self.commands_refused,
            self.lines_ignored,
            self.lines_discarded
        )
    }
}

/// Result of a session that ended cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub termination: Termination,
    pub stats: SessionStats,
}

/// Settings for one reactor.
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Input event device to read keys from.
    pub device_path: PathBuf,
    /// Server hostname or IP address.
    pub server_host: String,
    /// Server TCP port.
    pub server_port: u16,
    /// Period of the shutdown check.
    pub poll_interval: Duration,
    /// Upper bound on bytes taken from the server per read.
    pub read_buffer_size: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/input/event0"),
            server_host: "127.0.0.1".to_string(),
            server_port: 65432,
            poll_interval: Duration::from_millis(100),
            read_buffer_size: 1024,
        }
    }
}

impl ReactorConfig {
    /// `host:port` of the server, as used in logs and errors.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// What became ready in one loop iteration.
enum Readiness {
    Device(std::io::Result<usize>),
    Network(std::io::Result<usize>),
    Tick,
}

/// Owns the input device and the server connection for one session.
///
/// `D` is the device and `S` the server stream; production uses
/// [`EventDevice`] and [`TcpStream`], tests use in-memory mocks.
pub struct ClientReactor<D, S> {
    device: Option<D>,
    network: Option<S>,
    router: CommandRouter,
    config: ReactorConfig,
    running: Arc<AtomicBool>,
    state: ReactorState,
    stats: SessionStats,
}

impl ClientReactor<EventDevice, TcpStream> {
    /// Opens the device, then connects to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::DeviceOpen`] or [`ReactorError::Connect`].
    /// Whatever was already acquired is released before returning.
    pub async fn connect(
        config: ReactorConfig,
        sink: Arc<dyn PlaybackSink>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, ReactorError> {
        let mut reactor = Self::new(config, sink, running);
        reactor.state = ReactorState::Connecting;

        let path = reactor.config.device_path.clone();
        match EventDevice::open(&path) {
            Ok(device) => {
                info!("opened input device {}", path.display());
                reactor.device = Some(device);
            }
            Err(source) => {
                reactor.close().await;
                return Err(ReactorError::DeviceOpen { path, source });
            }
        }

        let addr = reactor.config.server_addr();
        let host = reactor.config.server_host.clone();
        match TcpStream::connect((host.as_str(), reactor.config.server_port)).await {
            Ok(stream) => {
                // Frames are 2 bytes; don't let Nagle hold them back.
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("could not set TCP_NODELAY: {e}");
                }
                info!("connected to server at {addr}");
                reactor.network = Some(stream);
            }
            Err(source) => {
                reactor.close().await;
                return Err(ReactorError::Connect { addr, source });
            }
        }

        reactor.state = ReactorState::Connected;
        Ok(reactor)
    }
}

impl<D, S> ClientReactor<D, S>
where
    D: AsyncRead + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a reactor that holds no resources yet.
    pub fn new(config: ReactorConfig, sink: Arc<dyn PlaybackSink>, running: Arc<AtomicBool>) -> Self {
        Self {
            device: None,
            network: None,
            router: CommandRouter::new(sink),
            config,
            running,
            state: ReactorState::Disconnected,
            stats: SessionStats::default(),
        }
    }

    /// Creates a connected reactor from an already-open device and stream.
    pub fn from_parts(
        device: D,
        network: S,
        config: ReactorConfig,
        sink: Arc<dyn PlaybackSink>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let mut reactor = Self::new(config, sink, running);
        reactor.device = Some(device);
        reactor.network = Some(network);
        reactor.state = ReactorState::Connected;
        reactor
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReactorState {
        self.state
    }

    /// Counters so far, including for a session that ended in error.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Runs the event loop until a terminal condition, then cleans up.
    ///
    /// # Errors
    ///
    /// Returns [`ReactorError::NotConnected`] if called outside `Connected`,
    /// and the corresponding [`ReactorError`] for a device or network
    /// failure. Cleanup has run by the time this returns either way.
    pub async fn run(&mut self) -> Result<SessionReport, ReactorError> {
        if self.state != ReactorState::Connected {
            return Err(ReactorError::NotConnected(self.state));
        }

        let outcome = self.event_loop().await;

        self.state = ReactorState::Closing;
        self.close().await;

        match &outcome {
            Ok(termination) => info!("session ended: {termination}"),
            Err(e) => error!("session failed: {e}"),
        }
        info!("session summary: {}", self.stats);

        outcome.map(|termination| SessionReport {
            termination,
            stats: self.stats,
        })
    }

    /// Releases the device and shuts down the connection.
    ///
    /// Returns `true` if anything was released; later calls return `false`.
    pub async fn close(&mut self) -> bool {
        let mut released = false;

        if self.device.take().is_some() {
            debug!("input device released");
            released = true;
        }
        if let Some(mut network) = self.network.take() {
            if let Err(e) = network.shutdown().await {
                debug!("connection shutdown: {e}");
            }
            debug!("server connection closed");
            released = true;
        }

        self.state = ReactorState::Closed;
        released
    }

    async fn event_loop(&mut self) -> Result<Termination, ReactorError> {
        let mut tick = time::interval(self.config.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut record = [0u8; INPUT_EVENT_SIZE];
        let mut inbound = vec![0u8; self.config.read_buffer_size.max(1)];

        loop {
            let readiness = {
                let (Some(device), Some(network)) = (self.device.as_mut(), self.network.as_mut())
                else {
                    return Err(ReactorError::NotConnected(self.state));
                };
                tokio::select! {
                    r = device.read(&mut record) => Readiness::Device(r),
                    r = network.read(&mut inbound) => Readiness::Network(r),
                    _ = tick.tick() => Readiness::Tick,
                }
            };

            match readiness {
                Readiness::Device(Ok(n)) if n < INPUT_EVENT_SIZE => {
                    return Err(ReactorError::DeviceShortRead { got: n });
                }
                Readiness::Device(Ok(_)) => self.on_record(&record).await?,
                Readiness::Device(Err(e)) => return Err(ReactorError::DeviceRead(e)),

                Readiness::Network(Ok(0)) => return Ok(Termination::PeerClosed),
                Readiness::Network(Ok(n)) => {
                    let route = self.router.route(&inbound[..n]);
                    self.stats.absorb_route(route);
                }
                Readiness::Network(Err(e)) => return Err(ReactorError::NetworkRead(e)),

                Readiness::Tick => {
                    if !self.running.load(Ordering::Relaxed) {
                        return Ok(Termination::ShutdownRequested);
                    }
                }
            }
        }
    }

    async fn on_record(&mut self, raw: &[u8; INPUT_EVENT_SIZE]) -> Result<(), ReactorError> {
        let event = InputEvent::from_bytes(raw);
        match forward_key_event(&event) {
            KeyDecision::Send(frame) => {
                let Some(network) = self.network.as_mut() else {
                    return Err(ReactorError::NotConnected(self.state));
                };
                let sent = network
                    .write(&frame.to_bytes())
                    .await
                    .map_err(ReactorError::NetworkWrite)?;
                if sent < FRAME_SIZE {
                    return Err(ReactorError::ShortWrite { sent });
                }
                self.stats.frames_sent += 1;
            }
            KeyDecision::SkippedWideCode(code) => {
                warn!(code, "key code above 255 cannot be sent; skipped");
                self.stats.keys_skipped += 1;
            }
            KeyDecision::Autorepeat | KeyDecision::Ignored(_) | KeyDecision::NotKey => {}
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
