//! Protocol module containing message types, the codec, and line reassembly.

pub mod codec;
pub mod lines;
pub mod messages;

pub use codec::{decode_frame, decode_server_line, encode_key_event, encode_play_command};
pub use lines::{LineBuffer, DEFAULT_MAX_LINE_LEN};
pub use messages::*;
