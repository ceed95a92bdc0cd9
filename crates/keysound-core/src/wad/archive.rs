//! Eager reader for the WAD container format.
//!
//! Layout (all integers little-endian, signed 32-bit):
//! ```text
//! header    [magic:4]["IWAD"|"PWAD"][lump_count:4][directory_offset:4]
//! directory lump_count × [lump_offset:4][lump_size:4][name:8]
//! ```
//! Entry `i` lives at `directory_offset + i * 16`. Payloads can sit anywhere
//! in the file; the reader seeks to each one in directory order and copies it
//! into memory. Nothing is read lazily after [`WadArchive::load`] returns.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::protocol::messages::LumpIndex;

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Size of one directory entry in bytes.
pub const DIRECTORY_ENTRY_SIZE: usize = 16;

/// Length of the null-padded lump name field.
pub const LUMP_NAME_SIZE: usize = 8;

/// Errors that can occur while loading an archive.
#[derive(Debug, Error)]
pub enum WadError {
    /// The archive file could not be opened.
    #[error("failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A read or seek failed for a reason other than running out of data.
    #[error("I/O error while reading archive: {0}")]
    Io(#[from] io::Error),

    /// Fewer than 12 bytes were available for the header.
    #[error("header is too short: need 12 bytes, got {got}")]
    TruncatedHeader { got: usize },

    /// The identification field is neither `IWAD` nor `PWAD`.
    #[error("not a WAD archive: identification is {0:?}")]
    BadMagic([u8; 4]),

    /// A count or offset that must be non-negative was negative.
    #[error("{field} is negative ({value})")]
    NegativeField { field: &'static str, value: i32 },

    /// A directory entry ran past the end of the file.
    #[error("directory entry {index} is incomplete: need 16 bytes, got {got}")]
    TruncatedDirectory { index: u32, got: usize },

    /// A lump's payload ran past the end of the file.
    #[error("incomplete lump data for {name:?} (entry {index}): expected {expected} bytes, got {got}")]
    TruncatedLump {
        index: u32,
        name: String,
        expected: usize,
        got: usize,
    },
}

/// Which flavour of archive was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WadKind {
    /// A main ("internal") archive.
    Iwad,
    /// A patch archive.
    Pwad,
}

impl WadKind {
    fn from_magic(magic: [u8; 4]) -> Result<Self, WadError> {
        match &magic {
            b"IWAD" => Ok(WadKind::Iwad),
            b"PWAD" => Ok(WadKind::Pwad),
            _ => Err(WadError::BadMagic(magic)),
        }
    }

    /// Returns the 4-byte identification string.
    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            WadKind::Iwad => b"IWAD",
            WadKind::Pwad => b"PWAD",
        }
    }
}

/// One lump: an advisory name and its payload.
///
/// The payload is reference-counted so playback sessions can hold on to it
/// without copying.
#[derive(Debug, Clone)]
pub struct Lump {
    name: String,
    data: Arc<[u8]>,
}

impl Lump {
    /// Creates a lump from its parts.
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// The decoded lump name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw payload.
    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for a zero-length (marker) lump.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A fully loaded, immutable archive.
#[derive(Debug, Clone)]
pub struct WadArchive {
    kind: WadKind,
    lumps: Vec<Lump>,
}

impl WadArchive {
    /// Opens and parses the archive at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WadError`] if the file cannot be read or violates the format.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| WadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = Self::from_reader(BufReader::new(file))?;
        debug!(
            "loaded {:?} archive {} with {} lumps ({} bytes)",
            archive.kind,
            path.display(),
            archive.len(),
            archive.total_bytes()
        );
        Ok(archive)
    }

    /// Parses an archive from any seekable byte source.
    ///
    /// # Errors
    ///
    /// Returns [`WadError`] if the source violates the format.
    pub fn from_reader<R: Read + Seek>(mut reader: R) -> Result<Self, WadError> {
        let mut header = [0u8; HEADER_SIZE];
        let got = read_up_to(&mut reader, &mut header)?;
        if got < HEADER_SIZE {
            return Err(WadError::TruncatedHeader { got });
        }

        let kind = WadKind::from_magic([header[0], header[1], header[2], header[3]])?;
        let lump_count = non_negative("lump count", read_i32(&header, 4))?;
        let directory_offset = non_negative("directory offset", read_i32(&header, 8))?;

        let mut lumps = Vec::with_capacity(lump_count.min(4096) as usize);
        for index in 0..lump_count {
            let entry_offset =
                u64::from(directory_offset) + u64::from(index) * DIRECTORY_ENTRY_SIZE as u64;
            reader.seek(SeekFrom::Start(entry_offset))?;

            let mut entry = [0u8; DIRECTORY_ENTRY_SIZE];
            let got = read_up_to(&mut reader, &mut entry)?;
            if got < DIRECTORY_ENTRY_SIZE {
                return Err(WadError::TruncatedDirectory { index, got });
            }

            let lump_offset = non_negative("lump offset", read_i32(&entry, 0))?;
            let lump_size = non_negative("lump size", read_i32(&entry, 4))? as usize;
            let name = decode_lump_name(&entry[8..8 + LUMP_NAME_SIZE]);

            reader.seek(SeekFrom::Start(u64::from(lump_offset)))?;
            let mut data = Vec::new();
            // Bounded by `take`: the declared size never drives an allocation.
            (&mut reader).take(lump_size as u64).read_to_end(&mut data)?;
            if data.len() < lump_size {
                return Err(WadError::TruncatedLump {
                    index,
                    name,
                    expected: lump_size,
                    got: data.len(),
                });
            }

            lumps.push(Lump::new(name, data));
        }

        Ok(Self { kind, lumps })
    }

    /// Builds an archive directly from lumps, in directory order.
    pub fn from_lumps(kind: WadKind, lumps: impl IntoIterator<Item = Lump>) -> Self {
        Self {
            kind,
            lumps: lumps.into_iter().collect(),
        }
    }

    /// IWAD or PWAD.
    pub fn kind(&self) -> WadKind {
        self.kind
    }

    /// Number of lumps in the directory.
    pub fn len(&self) -> usize {
        self.lumps.len()
    }

    /// Returns `true` when the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.lumps.is_empty()
    }

    /// Looks up a lump by directory position.
    pub fn lump(&self, index: LumpIndex) -> Option<&Lump> {
        self.lumps.get(index.as_usize())
    }

    /// Iterates over all lumps in directory order.
    pub fn lumps(&self) -> impl Iterator<Item = (LumpIndex, &Lump)> {
        self.lumps
            .iter()
            .enumerate()
            .map(|(i, lump)| (LumpIndex(i as u32), lump))
    }

    /// Finds the first lump called `name` (case-sensitive).
    ///
    /// Names are not unique inside an archive, so this is only useful for
    /// diagnostics; playback always addresses lumps by index.
    pub fn find(&self, name: &str) -> Option<(LumpIndex, &Lump)> {
        self.lumps().find(|(_, lump)| lump.name() == name)
    }

    /// Sum of all payload sizes.
    pub fn total_bytes(&self) -> usize {
        self.lumps.iter().map(Lump::len).sum()
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Strips trailing null padding and drops any non-ASCII byte.
fn decode_lump_name(raw: &[u8]) -> String {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    raw[..end]
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect()
}

fn read_i32(buf: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn non_negative(field: &'static str, value: i32) -> Result<u32, WadError> {
    u32::try_from(value).map_err(|_| WadError::NegativeField { field, value })
}

/// Fills as much of `buf` as the source can provide, stopping early only at
/// end of file.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
