//! Reader for the WAD archive format used by the legacy game assets.
//!
//! The whole archive is parsed once at startup by [`WadArchive::load`] and is
//! read-only afterwards, so it can be shared across playback workers behind
//! an `Arc` without further synchronisation.

pub mod archive;

pub use archive::{
    Lump, WadArchive, WadError, WadKind, DIRECTORY_ENTRY_SIZE, HEADER_SIZE, LUMP_NAME_SIZE,
};
