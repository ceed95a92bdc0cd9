//! ForwardKeys use case: classifies raw input records for the wire.
//!
//! Only `EV_KEY` records with a press or release value produce a frame.
//! Everything else is dropped here so the reactor only ever sees "send this"
//! or "nothing to send".

use keysound_core::{encode_key_event, Encoded, InputEvent, KeyAction, WireFrame};
use tracing::debug;

/// Outcome of classifying one input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDecision {
    /// Write this frame to the server.
    Send(WireFrame),
    /// A press or release whose code does not fit in one byte.
    SkippedWideCode(u16),
    /// Typematic repeat of a held key.
    Autorepeat,
    /// A key record with an unrecognised value.
    Ignored(i32),
    /// Not an `EV_KEY` record (`EV_SYN`, `EV_MSC`, ...).
    NotKey,
}

/// Classifies `event` and, for presses and releases, encodes the frame.
pub fn forward_key_event(event: &InputEvent) -> KeyDecision {
    let Some(action) = event.key_action() else {
        return KeyDecision::NotKey;
    };

    let is_press = match action {
        KeyAction::Press => true,
        KeyAction::Release => false,
        KeyAction::Autorepeat => return KeyDecision::Autorepeat,
        KeyAction::Unknown(value) => {
            debug!(code = event.code, value, "ignoring key record with unknown value");
            return KeyDecision::Ignored(value);
        }
    };

    if is_press {
        debug!(code = event.code, "key down");
    } else {
        debug!(code = event.code, "key up");
    }

    match encode_key_event(is_press, event.code) {
        Encoded::Frame(frame) => KeyDecision::Send(frame),
        Encoded::Skip => {
            debug!(code = event.code, "key code does not fit the wire format; skipped");
            KeyDecision::SkippedWideCode(event.code)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
