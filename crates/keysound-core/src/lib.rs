//! # keysound-core
//!
//! Shared library for keysound containing the wire protocol codec and the WAD
//! archive reader.
//!
//! This crate performs no network or device I/O; the only file access is the
//! one-shot archive load.
//!
//! - **`protocol`** – How bytes travel over the connection. Key transitions
//!   leave the client as 2-byte frames; the server answers with
//!   newline-delimited `P<n>` commands naming a sound to play.
//!
//! - **`wad`** – The container holding the sounds. A WAD file is a header, a
//!   flat directory of named "lumps", and their raw payloads. Sound lumps are
//!   played back as 8-bit unsigned mono PCM at 11025 Hz.

pub mod protocol;
pub mod wad;

pub use protocol::codec::{decode_frame, decode_server_line, encode_key_event};
pub use protocol::messages::{Encoded, InputEvent, KeyAction, KeyTransition, LumpIndex, WireFrame};
pub use wad::{Lump, WadArchive, WadError, WadKind};
