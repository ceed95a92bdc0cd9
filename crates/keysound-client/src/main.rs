//! keysound client entry point.
//!
//! # Startup
//!
//! ```text
//! parse CLI ─▶ load + merge config ─▶ logging ─▶ load WAD ─▶ audio engine
//!     ─▶ playback dispatcher ─▶ Ctrl-C handler ─▶ connect ─▶ run ─▶ stop
//! ```
//!
//! The archive is loaded, and the audio engine built, before the device or
//! the server is touched; either failing ends the program straight away.
//! Once the reactor returns, the dispatcher is stopped, which lets every
//! sound already queued finish playing.
//!
//! # Usage
//!
//! ```text
//! keysound-client [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>     TOML config file
//!   -H, --host <HOST>       Server host            [env: KEYSOUND_HOST]
//!   -p, --port <PORT>       Server port            [env: KEYSOUND_PORT]
//!   -d, --device <PATH>     Input event device     [env: KEYSOUND_DEVICE]
//!   -w, --wad <PATH>        WAD archive            [env: KEYSOUND_WAD]
//!       --workers <N>       Playback threads       [env: KEYSOUND_WORKERS]
//!       --audio <BACKEND>   cpal | null            [env: KEYSOUND_AUDIO]
//!   -v, --verbose           Debug logging          [env: KEYSOUND_VERBOSE]
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keysound_client::infrastructure::{
    config::{AppConfig, AudioBackend},
    playback::{AudioEngine, NullAudioEngine, PlaybackDispatcher},
    reactor::ClientReactor,
};
use keysound_core::WadArchive;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Forwards keystrokes to a keysound server and plays the sounds it sends back.
///
/// Flags override values from `--config`; unset flags fall back to the file,
/// then to built-in defaults.
#[derive(Debug, Parser)]
#[command(name = "keysound-client", version)]
struct Cli {
    /// TOML config file.
    #[arg(short, long, env = "KEYSOUND_CONFIG")]
    config: Option<PathBuf>,

    /// Server hostname or IP address.
    #[arg(short = 'H', long, env = "KEYSOUND_HOST")]
    host: Option<String>,

    /// Server TCP port.
    #[arg(short, long, env = "KEYSOUND_PORT")]
    port: Option<u16>,

    /// Input event device, e.g. `/dev/input/event3`.
    #[arg(short, long, env = "KEYSOUND_DEVICE")]
    device: Option<PathBuf>,

    /// WAD archive holding the sound lumps.
    #[arg(short, long, env = "KEYSOUND_WAD")]
    wad: Option<PathBuf>,

    /// Number of sounds that may play at once.
    #[arg(long, env = "KEYSOUND_WORKERS")]
    workers: Option<usize>,

    /// Audio output backend.
    #[arg(long, value_enum, env = "KEYSOUND_AUDIO")]
    audio: Option<AudioBackend>,

    /// Log at debug level (ignored when `RUST_LOG` is set).
    #[arg(short, long, env = "KEYSOUND_VERBOSE")]
    verbose: bool,
}

impl Cli {
    /// Loads the config file, if any, and applies the flags on top.
    fn into_app_config(self) -> anyhow::Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => AppConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => AppConfig::default(),
        };

        if let Some(host) = self.host {
            cfg.server.host = host;
        }
        if let Some(port) = self.port {
            cfg.server.port = port;
        }
        if let Some(device) = self.device {
            cfg.device.path = device;
        }
        if let Some(wad) = self.wad {
            cfg.audio.archive = wad;
        }
        if let Some(workers) = self.workers {
            cfg.audio.workers = workers;
        }
        if let Some(audio) = self.audio {
            cfg.audio.backend = audio;
        }
        cfg.verbose |= self.verbose;

        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

fn build_engine(backend: AudioBackend) -> anyhow::Result<Arc<dyn AudioEngine>> {
    match backend {
        #[cfg(feature = "cpal")]
        AudioBackend::Cpal => {
            let engine = keysound_client::infrastructure::playback::CpalAudioEngine::new()
                .context("initialising audio output")?;
            Ok(Arc::new(engine))
        }
        #[cfg(not(feature = "cpal"))]
        AudioBackend::Cpal => {
            anyhow::bail!("built without cpal support; use --audio null")
        }
        AudioBackend::Null => Ok(Arc::new(NullAudioEngine::new())),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = Cli::parse().into_app_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.effective_log_level())),
        )
        .init();

    info!("keysound client starting");

    // ── Sound archive ─────────────────────────────────────────────────────────
    let archive = WadArchive::load(&cfg.audio.archive)
        .with_context(|| format!("loading archive {}", cfg.audio.archive.display()))?;
    info!(
        "loaded {} lumps ({} bytes) from {}",
        archive.len(),
        archive.total_bytes(),
        cfg.audio.archive.display()
    );

    // ── Playback ──────────────────────────────────────────────────────────────
    let engine = build_engine(cfg.audio.backend)?;
    let dispatcher = Arc::new(
        PlaybackDispatcher::start(Arc::new(archive), engine, cfg.audio.workers)
            .context("starting playback workers")?,
    );

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    // ── Reactor ───────────────────────────────────────────────────────────────
    let reactor_cfg = cfg.reactor_config();
    let addr = reactor_cfg.server_addr();
    let mut reactor =
        match ClientReactor::connect(reactor_cfg, dispatcher.clone(), Arc::clone(&running)).await {
            Ok(reactor) => reactor,
            Err(e) => {
                dispatcher.stop();
                return Err(e).with_context(|| format!("starting session with {addr}"));
            }
        };

    let outcome = reactor.run().await;

    info!("waiting for queued sounds to finish");
    dispatcher.stop();

    match outcome {
        Ok(report) => {
            info!(
                "keysound client stopped: {} ({} frames sent, {} sounds queued)",
                report.termination, report.stats.frames_sent, report.stats.commands_dispatched
            );
            Ok(())
        }
        Err(e) => {
            warn!("keysound client stopped after an error");
            Err(e).context("session ended")
        }
    }
}
