//! SUMP wire protocol.
//!
//! The protocol code follows a layered structure:
//! - `layout`: opcodes, flag bits and message sizes (source of truth)
//! - `reader`: bounded reads from a transport or a command buffer
//! - `encoder` / `message`: host commands, both directions
//! - `capture` / `metadata`: device replies
//! - `error`: explicit, actionable errors
//!
//! Encoding is pure. The decoders read from a `Transport` but never write to
//! it; `Device` owns the command/reply sequencing.

pub mod capture;
pub mod encoder;
pub mod error;
pub mod layout;
pub mod message;
pub mod metadata;
pub(crate) mod reader;

pub use capture::{decode_capture, decode_samples};
pub use encoder::{
    LongCommand, ShortCommand, encode_counts, encode_divider, encode_flags, encode_settings,
    encode_settings_with_mode, trigger_commands,
};
pub use error::ProtocolError;
pub use message::{Message, decode_messages};
pub use metadata::{TokenPolicy, decode_metadata};
