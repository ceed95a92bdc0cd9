//! Message types shared by the client and any server speaking the keysound
//! wire protocol.
//!
//! Two directions, two very different encodings:
//!
//! - **client → server**: fixed 2-byte [`WireFrame`]s, `[identifier, code]`.
//! - **server → client**: newline-delimited ASCII commands, `P<digits>`.
//!
//! The raw [`InputEvent`] record read from the kernel input device is also
//! defined here because it is the source of every outbound frame.

use std::fmt;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Identifier byte of a key-press frame.
pub const PRESS_IDENTIFIER: u8 = 254;

/// Identifier byte of a key-release frame.
pub const RELEASE_IDENTIFIER: u8 = 255;

/// Size of one outbound frame in bytes.
pub const FRAME_SIZE: usize = 2;

/// Size of one raw input record (`struct input_event` on 64-bit Linux).
pub const INPUT_EVENT_SIZE: usize = 24;

/// `EV_KEY` from `linux/input-event-codes.h`.
pub const EV_KEY: u16 = 0x01;

/// Leading byte of a play command line.
pub const PLAY_COMMAND_PREFIX: u8 = b'P';

// ── Key transitions and frames ────────────────────────────────────────────────

/// A single key state change as it travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyTransition {
    /// `true` for a press, `false` for a release.
    pub is_press: bool,
    /// Kernel key code. Only codes `0..=255` are representable on the wire.
    pub code: u8,
}

/// One outbound 2-byte frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireFrame {
    identifier: u8,
    code: u8,
}

impl WireFrame {
    /// Builds the frame for `transition`.
    pub fn new(transition: KeyTransition) -> Self {
        let identifier = if transition.is_press {
            PRESS_IDENTIFIER
        } else {
            RELEASE_IDENTIFIER
        };
        Self {
            identifier,
            code: transition.code,
        }
    }

    /// Returns the identifier byte (`254` or `255`).
    pub fn identifier(&self) -> u8 {
        self.identifier
    }

    /// Returns the key code byte.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Returns the frame exactly as it is written to the socket.
    pub fn to_bytes(self) -> [u8; FRAME_SIZE] {
        [self.identifier, self.code]
    }
}

/// Result of encoding a key transition.
///
/// `Skip` is not an error: a code that does not fit in one byte is simply not
/// sent, and the caller carries on as if it had been.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoded {
    /// The frame to write.
    Frame(WireFrame),
    /// The code was out of range; nothing goes on the wire.
    Skip,
}

// ── Raw input records ─────────────────────────────────────────────────────────

/// Classification of a `EV_KEY` record's `value` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// `value == 1`
    Press,
    /// `value == 0`
    Release,
    /// `value == 2`; the kernel's typematic repeat. Never forwarded.
    Autorepeat,
    /// Any other value.
    Unknown(i32),
}

impl From<i32> for KeyAction {
    fn from(value: i32) -> Self {
        match value {
            1 => KeyAction::Press,
            0 => KeyAction::Release,
            2 => KeyAction::Autorepeat,
            other => KeyAction::Unknown(other),
        }
    }
}

/// One fixed-size record read from an input event device.
///
/// Layout (host byte order):
///
/// ```text
/// [seconds:8][microseconds:8][type:2][code:2][value:4]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub seconds: u64,
    pub microseconds: u64,
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl InputEvent {
    /// Decodes one complete record.
    pub fn from_bytes(raw: &[u8; INPUT_EVENT_SIZE]) -> Self {
        Self {
            seconds: u64::from_ne_bytes([
                raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
            ]),
            microseconds: u64::from_ne_bytes([
                raw[8], raw[9], raw[10], raw[11], raw[12], raw[13], raw[14], raw[15],
            ]),
            event_type: u16::from_ne_bytes([raw[16], raw[17]]),
            code: u16::from_ne_bytes([raw[18], raw[19]]),
            value: i32::from_ne_bytes([raw[20], raw[21], raw[22], raw[23]]),
        }
    }

    /// Decodes the first record in `bytes`, or `None` if fewer than
    /// [`INPUT_EVENT_SIZE`] bytes are available.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let raw: &[u8; INPUT_EVENT_SIZE] = bytes.get(..INPUT_EVENT_SIZE)?.try_into().ok()?;
        Some(Self::from_bytes(raw))
    }

    /// Encodes the record back into its 24-byte form.
    ///
    /// The client never writes records; this exists for fixtures and for
    /// tools that synthesise device input.
    pub fn to_bytes(&self) -> [u8; INPUT_EVENT_SIZE] {
        let mut raw = [0u8; INPUT_EVENT_SIZE];
        raw[0..8].copy_from_slice(&self.seconds.to_ne_bytes());
        raw[8..16].copy_from_slice(&self.microseconds.to_ne_bytes());
        raw[16..18].copy_from_slice(&self.event_type.to_ne_bytes());
        raw[18..20].copy_from_slice(&self.code.to_ne_bytes());
        raw[20..24].copy_from_slice(&self.value.to_ne_bytes());
        raw
    }

    /// Convenience constructor for a key record with zeroed timestamps.
    pub fn key(code: u16, value: i32) -> Self {
        Self {
            seconds: 0,
            microseconds: 0,
            event_type: EV_KEY,
            code,
            value,
        }
    }

    /// Returns `true` when the record is an `EV_KEY` event.
    pub fn is_key(&self) -> bool {
        self.event_type == EV_KEY
    }

    /// Classifies the value of a key record; `None` for every other type.
    pub fn key_action(&self) -> Option<KeyAction> {
        self.is_key().then(|| KeyAction::from(self.value))
    }
}

// ── Lump addressing ───────────────────────────────────────────────────────────

/// Position of a lump in an archive's directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LumpIndex(pub u32);

impl LumpIndex {
    /// Returns the index as a `usize` for slice lookups.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LumpIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for LumpIndex {
    fn from(value: u32) -> Self {
        LumpIndex(value)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
