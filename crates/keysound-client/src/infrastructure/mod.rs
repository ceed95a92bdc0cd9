//! Infrastructure layer for the client application.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keysound_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`config`** – TOML configuration file with serde defaults.
//!
//! - **`device`** – Non-blocking reader for a Linux input event device,
//!   registered with the tokio reactor through `AsyncFd`.
//!
//! - **`playback`** – Worker pool that renders sound lumps through an
//!   [`playback::AudioEngine`]. Implements the application layer's
//!   `PlaybackSink`.
//!
//! - **`reactor`** – The single-task loop that multiplexes the input device,
//!   the server connection and a shutdown tick.

pub mod config;
pub mod device;
pub mod playback;
pub mod reactor;
