//! keysound-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! The client does two things over one TCP connection:
//!
//! 1. Reads raw key records from a Linux input device and forwards every
//!    press and release to the server as a 2-byte frame.
//! 2. Reads `P<n>` commands from the server and plays the matching sound lump
//!    from a WAD archive on a small pool of playback threads.

/// Application layer: key forwarding and command routing.
pub mod application;

/// Infrastructure layer: input device, reactor, playback and configuration.
pub mod infrastructure;
