//! Opcodes and message sizes of the SUMP wire format.

pub const CMD_RESET: u8 = 0x00;
pub const CMD_RUN: u8 = 0x01;
pub const CMD_ID: u8 = 0x02;
pub const CMD_METADATA: u8 = 0x04;
pub const CMD_XON: u8 = 0x11;
pub const CMD_XOFF: u8 = 0x13;

pub const CMD_DIVIDER: u8 = 0x80;
pub const CMD_COUNTS: u8 = 0x81;
pub const CMD_FLAGS: u8 = 0x82;

/// Opcodes at or above this value carry a 4-byte argument.
pub const LONG_COMMAND_MIN: u8 = 0x80;
pub const LONG_COMMAND_LEN: usize = 5;
pub const RESET_REPEAT: usize = 5;

/// Bits 2..=3 of a trigger opcode select the stage.
pub const TRIGGER_STAGE_SHIFT: u8 = 2;
pub const TRIGGER_KIND_MASK: u8 = 0b11;
pub const TRIGGER_OPCODE_BASE: u8 = 0xC0;
pub const TRIGGER_OPCODE_MASK: u8 = 0xF0;
pub const TRIGGER_KIND_MASK_WORD: u8 = 0;
pub const TRIGGER_KIND_VALUE: u8 = 1;
pub const TRIGGER_KIND_CONFIG: u8 = 2;

pub const FLAG_DEMUX: u8 = 1 << 0;
pub const FLAG_FILTER: u8 = 1 << 1;
pub const FLAG_CHANNEL_GROUPS_SHIFT: u8 = 2;
pub const FLAG_CHANNEL_GROUPS_MASK: u8 = 0b1111 << FLAG_CHANNEL_GROUPS_SHIFT;
pub const FLAG_EXTERNAL: u8 = 1 << 6;
pub const FLAG_INVERTED: u8 = 1 << 7;

pub const CONFIG_START: u8 = 1 << 3;
pub const CONFIG_SERIAL: u8 = 1 << 2;
pub const CONFIG_CHANNEL_HIGH: u8 = 1 << 0;

/// Device ID replies are 4 bytes, least significant first.
pub const ID_REPLY_LEN: usize = 4;

pub const METADATA_END: u8 = 0x00;
pub const METADATA_TEXT_MAX: u8 = 0x1F;
pub const METADATA_U32_MAX: u8 = 0x3F;
pub const METADATA_U8_MAX: u8 = 0x5F;
