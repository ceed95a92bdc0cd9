//! Integration tests for loading WAD archives from disk.

use std::fs;
use std::path::PathBuf;

use keysound_core::{wad::HEADER_SIZE, LumpIndex, WadArchive, WadError, WadKind};

/// Writes `bytes` to a unique file under the system temp directory and
/// removes it on drop.
struct TempWad(PathBuf);

impl TempWad {
    fn new(tag: &str, bytes: &[u8]) -> Self {
        let path = std::env::temp_dir().join(format!(
            "keysound-{}-{}.wad",
            std::process::id(),
            tag
        ));
        fs::write(&path, bytes).expect("write temp archive");
        Self(path)
    }
}

impl Drop for TempWad {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

/// Builds an archive whose directory precedes the payloads, the layout some
/// editors produce.
fn directory_first(magic: &[u8; 4], lumps: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let dir_len = lumps.len() * 16;
    let mut directory = Vec::new();
    let mut payloads = Vec::new();
    for (name, data) in lumps {
        let offset = HEADER_SIZE + dir_len + payloads.len();
        directory.extend_from_slice(&(offset as i32).to_le_bytes());
        directory.extend_from_slice(&(data.len() as i32).to_le_bytes());
        let mut raw = [0u8; 8];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        directory.extend_from_slice(&raw);
        payloads.extend_from_slice(data);
    }

    let mut out = Vec::new();
    out.extend_from_slice(magic);
    out.extend_from_slice(&(lumps.len() as i32).to_le_bytes());
    out.extend_from_slice(&(HEADER_SIZE as i32).to_le_bytes());
    out.extend_from_slice(&directory);
    out.extend_from_slice(&payloads);
    out
}

#[test]
fn test_load_three_lump_iwad_from_disk() {
    // Arrange
    let lumps = vec![
        ("DSPISTOL", vec![0x80; 512]),
        ("DSSHOTGN", vec![0x7F; 1024]),
        ("DSDOROPN", vec![0x81; 77]),
    ];
    let file = TempWad::new("three", &directory_first(b"IWAD", &lumps));

    // Act
    let wad = WadArchive::load(&file.0).expect("archive must load");

    // Assert
    assert_eq!(wad.kind(), WadKind::Iwad);
    assert_eq!(wad.len(), 3);
    for (i, (name, data)) in lumps.iter().enumerate() {
        let lump = wad.lump(LumpIndex(i as u32)).unwrap();
        assert_eq!(lump.name(), *name);
        assert_eq!(lump.len(), data.len());
        assert_eq!(&lump.data()[..], &data[..]);
    }
}

#[test]
fn test_load_rejects_xwad() {
    let file = TempWad::new("xwad", &directory_first(b"XWAD", &[("A", vec![1])]));
    let err = WadArchive::load(&file.0).unwrap_err();
    assert!(matches!(err, WadError::BadMagic(_)));
}

#[test]
fn test_load_rejects_final_lump_past_eof() {
    // Arrange – cut the last payload short by five bytes
    let mut bytes = directory_first(b"PWAD", &[("A", vec![1; 8]), ("B", vec![2; 8])]);
    bytes.truncate(bytes.len() - 5);
    let file = TempWad::new("short", &bytes);

    // Act
    let err = WadArchive::load(&file.0).unwrap_err();

    // Assert
    match err {
        WadError::TruncatedLump { index, expected, got, .. } => {
            assert_eq!(index, 1);
            assert_eq!(expected, 8);
            assert_eq!(got, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_load_rejects_file_shorter_than_header() {
    let file = TempWad::new("tiny", b"PWAD");
    let err = WadArchive::load(&file.0).unwrap_err();
    assert!(matches!(err, WadError::TruncatedHeader { got: 4 }));
}
