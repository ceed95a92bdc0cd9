//! Application layer use cases for the client.
//!
//! - **`forward_keys`** – Decides what, if anything, goes on the wire for one
//!   raw input record.
//!
//! - **`play_commands`** – Turns bytes received from the server into playback
//!   requests and hands them to a [`play_commands::PlaybackSink`]. The sink is
//!   implemented in the infrastructure layer by the playback dispatcher.

pub mod forward_keys;
pub mod play_commands;
