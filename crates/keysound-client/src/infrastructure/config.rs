//! TOML configuration for the client.
//!
//! Every field has a serde default, so an empty file, a partial file and no
//! file at all are all valid. Command-line flags override whatever is loaded
//! here (see `main.rs`).
//!
//! ```toml
//! log_level = "info"
//! verbose = false
//!
//! [device]
//! path = "/dev/input/event0"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 65432
//!
//! [audio]
//! archive = "DOOM.WAD"
//! workers = 4
//! backend = "cpal"
//!
//! [reactor]
//! poll_interval_ms = 100
//! read_buffer_size = 1024
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::reactor::ReactorConfig;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub reactor: ReactorTuning,
    /// `tracing` level used when `RUST_LOG` is unset and `verbose` is off.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Forces `debug` logging.
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    /// Input event device node to read keys from.
    #[serde(default = "default_device_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which [`AudioEngine`](crate::infrastructure::playback::AudioEngine) renders lumps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    /// The host's default output device.
    #[default]
    Cpal,
    /// No output; sessions just take as long as the sound would.
    Null,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// WAD archive holding the sound lumps.
    #[serde(default = "default_archive")]
    pub archive: PathBuf,
    /// Number of playback worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub backend: AudioBackend,
}

/// Event loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactorTuning {
    /// How often the loop checks for a shutdown request while idle.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on bytes taken from the server per read.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_device_path() -> PathBuf {
    PathBuf::from("/dev/input/event0")
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    65432
}
fn default_archive() -> PathBuf {
    PathBuf::from("DOOM.WAD")
}
fn default_workers() -> usize {
    crate::infrastructure::playback::DEFAULT_WORKERS
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_read_buffer_size() -> usize {
    1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            server: ServerConfig::default(),
            audio: AudioConfig::default(),
            reactor: ReactorTuning::default(),
            log_level: default_log_level(),
            verbose: false,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: default_device_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            archive: default_archive(),
            workers: default_workers(),
            backend: AudioBackend::default(),
        }
    }
}

impl Default for ReactorTuning {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Reads and parses the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if the TOML is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Rejects values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.workers == 0 {
            return Err(ConfigError::Invalid("audio.workers must be at least 1".into()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".into()));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".into()));
        }
        if self.reactor.read_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "reactor.read_buffer_size must be at least 1".into(),
            ));
        }
        if self.reactor.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "reactor.poll_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The level passed to the log filter when `RUST_LOG` is unset.
    pub fn effective_log_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// Settings for the client reactor.
    pub fn reactor_config(&self) -> ReactorConfig {
        ReactorConfig {
            device_path: self.device.path.clone(),
            server_host: self.server.host.clone(),
            server_port: self.server.port,
            poll_interval: Duration::from_millis(self.reactor.poll_interval_ms),
            read_buffer_size: self.reactor.read_buffer_size,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
