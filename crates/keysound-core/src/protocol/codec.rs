//! Encoding and decoding for the keysound wire protocol.
//!
//! Wire format, client → server:
//! ```text
//! [identifier:1][code:1]      identifier = 254 (press) | 255 (release)
//! ```
//! Wire format, server → client:
//! ```text
//! P<decimal digits>\n         play lump <digits> + 1
//! ```
//!
//! Every function here is total: malformed input yields `None` / `Skip`,
//! never an error, because the protocol has no way to report one back.

use crate::protocol::messages::{
    Encoded, KeyTransition, LumpIndex, WireFrame, FRAME_SIZE, PLAY_COMMAND_PREFIX,
    PRESS_IDENTIFIER, RELEASE_IDENTIFIER,
};

// ── Client → server ───────────────────────────────────────────────────────────

/// Encodes a key transition into a 2-byte frame.
///
/// Returns [`Encoded::Skip`] when `code` does not fit in one byte.
///
/// # Examples
///
/// ```rust
/// use keysound_core::protocol::{encode_key_event, Encoded};
///
/// match encode_key_event(true, 30) {
///     Encoded::Frame(frame) => assert_eq!(frame.to_bytes(), [254, 30]),
///     Encoded::Skip => unreachable!(),
/// }
/// assert_eq!(encode_key_event(false, 256), Encoded::Skip);
/// ```
pub fn encode_key_event(is_press: bool, code: u16) -> Encoded {
    match u8::try_from(code) {
        Ok(code) => Encoded::Frame(WireFrame::new(KeyTransition { is_press, code })),
        Err(_) => Encoded::Skip,
    }
}

/// Decodes one 2-byte frame. Returns `None` for an unknown identifier byte.
pub fn decode_frame(bytes: [u8; FRAME_SIZE]) -> Option<KeyTransition> {
    let is_press = match bytes[0] {
        PRESS_IDENTIFIER => true,
        RELEASE_IDENTIFIER => false,
        _ => return None,
    };
    Some(KeyTransition {
        is_press,
        code: bytes[1],
    })
}

// ── Server → client ───────────────────────────────────────────────────────────

/// Decodes one server line (without its trailing newline).
///
/// A line of the form `P<digits>` yields the lump *after* the one named, so
/// `"P5"` plays lump 6. Anything else, including trailing characters, a sign,
/// whitespace, or a number whose successor does not fit in `u32`, yields
/// `None`.
///
/// # Examples
///
/// ```rust
/// use keysound_core::protocol::{decode_server_line, LumpIndex};
///
/// assert_eq!(decode_server_line("P5"), Some(LumpIndex(6)));
/// assert_eq!(decode_server_line("P5x"), None);
/// assert_eq!(decode_server_line("hello"), None);
/// ```
pub fn decode_server_line(line: impl AsRef<[u8]>) -> Option<LumpIndex> {
    let (&prefix, digits) = line.as_ref().split_first()?;
    if prefix != PLAY_COMMAND_PREFIX || digits.is_empty() {
        return None;
    }

    let mut value: u32 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
    }

    value.checked_add(1).map(LumpIndex)
}

/// Formats the line a server sends to make the client play `lump`.
///
/// This is the inverse of [`decode_server_line`], including the off-by-one:
/// asking for lump 6 produces `"P5\n"`. Returns `None` for lump 0, which no
/// command can reach.
pub fn encode_play_command(lump: LumpIndex) -> Option<String> {
    let named = lump.0.checked_sub(1)?;
    Some(format!("P{named}\n"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Frames ───────────────────────────────────────────────────────────────

    #[test]
    fn test_encode_press_produces_press_frame() {
        assert_eq!(
            encode_key_event(true, 30),
            Encoded::Frame(WireFrame::new(KeyTransition { is_press: true, code: 30 }))
        );
    }

    #[test]
    fn test_encode_boundary_codes() {
        assert!(matches!(encode_key_event(true, 0), Encoded::Frame(_)));
        assert!(matches!(encode_key_event(false, 255), Encoded::Frame(_)));
        assert_eq!(encode_key_event(true, 256), Encoded::Skip);
        assert_eq!(encode_key_event(false, u16::MAX), Encoded::Skip);
    }

    #[test]
    fn test_every_representable_code_survives_encode_then_decode() {
        for code in 0..=255u16 {
            for is_press in [true, false] {
                let Encoded::Frame(frame) = encode_key_event(is_press, code) else {
                    panic!("code {code} must encode");
                };
                let decoded = decode_frame(frame.to_bytes()).expect("frame must decode");
                assert_eq!(decoded.is_press, is_press);
                assert_eq!(u16::from(decoded.code), code);
            }
        }
    }

    #[test]
    fn test_decode_frame_rejects_unknown_identifier() {
        assert_eq!(decode_frame([0, 30]), None);
        assert_eq!(decode_frame([253, 30]), None);
    }

    // ── Server lines ─────────────────────────────────────────────────────────

    #[test]
    fn test_decode_play_command_applies_offset() {
        assert_eq!(decode_server_line("P5"), Some(LumpIndex(6)));
        assert_eq!(decode_server_line("P0"), Some(LumpIndex(1)));
        assert_eq!(decode_server_line(b"P575"), Some(LumpIndex(576)));
    }

    #[test]
    fn test_decode_accepts_leading_zeros() {
        assert_eq!(decode_server_line("P007"), Some(LumpIndex(8)));
    }

    #[test]
    fn test_decode_rejects_trailing_characters() {
        assert_eq!(decode_server_line("P5x"), None);
        assert_eq!(decode_server_line("P5 "), None);
        assert_eq!(decode_server_line("P5\r"), None);
    }

    #[test]
    fn test_decode_rejects_non_commands() {
        assert_eq!(decode_server_line("hello"), None);
        assert_eq!(decode_server_line(""), None);
        assert_eq!(decode_server_line("P"), None);
        assert_eq!(decode_server_line("p5"), None);
        assert_eq!(decode_server_line(" P5"), None);
    }

    #[test]
    fn test_decode_rejects_signs() {
        assert_eq!(decode_server_line("P-1"), None);
        assert_eq!(decode_server_line("P+1"), None);
    }

    #[test]
    fn test_decode_rejects_overflow() {
        // u32::MAX itself parses, but its successor does not exist.
        assert_eq!(decode_server_line(format!("P{}", u32::MAX)), None);
        assert_eq!(decode_server_line("P99999999999"), None);
        assert_eq!(
            decode_server_line(format!("P{}", u32::MAX - 1)),
            Some(LumpIndex(u32::MAX))
        );
    }

    #[test]
    fn test_encode_play_command_is_inverse_of_decode() {
        let line = encode_play_command(LumpIndex(11)).unwrap();
        assert_eq!(line, "P10\n");
        assert_eq!(decode_server_line(line.trim_end_matches('\n')), Some(LumpIndex(11)));
    }

    #[test]
    fn test_encode_play_command_cannot_reach_lump_zero() {
        assert_eq!(encode_play_command(LumpIndex(0)), None);
    }
}
