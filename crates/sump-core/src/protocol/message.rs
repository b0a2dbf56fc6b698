//! Decoding of host-to-device command bytes.
//!
//! This is the inverse of the encoder and is used to trace what a
//! configuration will send. Counts come back in samples (a multiple of 4) and
//! the divider comes back as the value the host asked for.

use std::fmt;

use super::error::ProtocolError;
use super::layout;
use super::reader::CommandReader;
use crate::trigger::TriggerStage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A run of reset bytes.
    Reset,
    Run,
    Id,
    Metadata,
    Xon,
    Xoff,
    Divider {
        divider: u32,
    },
    Counts {
        read_count: u32,
        delay_count: u32,
    },
    Flags {
        channel_groups: u8,
        demux: bool,
        filter: bool,
        external: bool,
        inverted: bool,
    },
    TriggerMask {
        stage: usize,
        mask: u32,
    },
    TriggerValue {
        stage: usize,
        value: u32,
    },
    /// Mask and value of `config` are always zero; they travel separately.
    TriggerConfig {
        stage: usize,
        config: TriggerStage,
    },
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Reset => f.write_str("reset"),
            Message::Run => f.write_str("run"),
            Message::Id => f.write_str("id"),
            Message::Metadata => f.write_str("metadata"),
            Message::Xon => f.write_str("xon"),
            Message::Xoff => f.write_str("xoff"),
            Message::Divider { divider } => write!(f, "divider {divider}"),
            Message::Counts {
                read_count,
                delay_count,
            } => write!(f, "counts read={read_count} delay={delay_count}"),
            Message::Flags {
                channel_groups,
                demux,
                filter,
                external,
                inverted,
            } => write!(
                f,
                "flags groups=0b{channel_groups:04b} demux={demux} filter={filter} external={external} inverted={inverted}"
            ),
            Message::TriggerMask { stage, mask } => {
                write!(f, "trigger[{stage}] mask 0x{mask:08x}")
            }
            Message::TriggerValue { stage, value } => {
                write!(f, "trigger[{stage}] value 0x{value:08x}")
            }
            Message::TriggerConfig { stage, config } => write!(
                f,
                "trigger[{stage}] config delay={} level={} channel={} serial={} start={}",
                config.delay, config.level, config.channel, config.serial, config.start
            ),
        }
    }
}

/// Split a host command stream into messages.
///
/// # Examples
/// ```
/// use sump_core::protocol::{Message, decode_messages};
///
/// let messages = decode_messages(&[0x00, 0x00, 0x80, 0x04, 0x00, 0x00, 0x00, 0x01]).unwrap();
/// assert_eq!(
///     messages,
///     vec![Message::Reset, Message::Divider { divider: 5 }, Message::Run]
/// );
/// ```
pub fn decode_messages(bytes: &[u8]) -> Result<Vec<Message>, ProtocolError> {
    let mut messages = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let opcode = bytes[offset];
        if opcode >= layout::LONG_COMMAND_MIN {
            let reader = CommandReader::new(&bytes[offset..]);
            reader.require_len(layout::LONG_COMMAND_LEN)?;
            messages.push(decode_long(&reader, opcode, offset)?);
            offset += layout::LONG_COMMAND_LEN;
            continue;
        }

        let message = match opcode {
            layout::CMD_RESET => {
                while bytes.get(offset + 1) == Some(&layout::CMD_RESET) {
                    offset += 1;
                }
                Message::Reset
            }
            layout::CMD_RUN => Message::Run,
            layout::CMD_ID => Message::Id,
            layout::CMD_METADATA => Message::Metadata,
            layout::CMD_XON => Message::Xon,
            layout::CMD_XOFF => Message::Xoff,
            _ => return Err(ProtocolError::UnknownOpcode { opcode, offset }),
        };
        messages.push(message);
        offset += 1;
    }

    Ok(messages)
}

fn decode_long(
    reader: &CommandReader<'_>,
    opcode: u8,
    offset: usize,
) -> Result<Message, ProtocolError> {
    match opcode {
        layout::CMD_DIVIDER => {
            let low = u32::from(reader.read_u16_le(1)?);
            let high = u32::from(reader.read_u8(3)?);
            Ok(Message::Divider {
                divider: ((high << 16) | low) + 1,
            })
        }
        layout::CMD_COUNTS => Ok(Message::Counts {
            read_count: u32::from(reader.read_u16_le(1)?) * 4,
            delay_count: u32::from(reader.read_u16_le(3)?) * 4,
        }),
        layout::CMD_FLAGS => {
            let flags = reader.read_u8(1)?;
            Ok(Message::Flags {
                channel_groups: (flags & layout::FLAG_CHANNEL_GROUPS_MASK)
                    >> layout::FLAG_CHANNEL_GROUPS_SHIFT,
                demux: flags & layout::FLAG_DEMUX != 0,
                filter: flags & layout::FLAG_FILTER != 0,
                external: flags & layout::FLAG_EXTERNAL != 0,
                inverted: flags & layout::FLAG_INVERTED != 0,
            })
        }
        _ if opcode & layout::TRIGGER_OPCODE_MASK == layout::TRIGGER_OPCODE_BASE => {
            let stage = usize::from((opcode >> layout::TRIGGER_STAGE_SHIFT) & 0b11);
            match opcode & layout::TRIGGER_KIND_MASK {
                layout::TRIGGER_KIND_MASK_WORD => Ok(Message::TriggerMask {
                    stage,
                    mask: reader.read_u32_le(1)?,
                }),
                layout::TRIGGER_KIND_VALUE => Ok(Message::TriggerValue {
                    stage,
                    value: reader.read_u32_le(1)?,
                }),
                layout::TRIGGER_KIND_CONFIG => Ok(Message::TriggerConfig {
                    stage,
                    config: decode_trigger_config(reader)?,
                }),
                _ => Err(ProtocolError::UnknownOpcode { opcode, offset }),
            }
        }
        _ => Err(ProtocolError::UnknownOpcode { opcode, offset }),
    }
}

fn decode_trigger_config(reader: &CommandReader<'_>) -> Result<TriggerStage, ProtocolError> {
    let delay = reader.read_u16_le(1)?;
    let channel_level = reader.read_u8(3)?;
    let control = reader.read_u8(4)?;
    Ok(TriggerStage {
        delay,
        level: channel_level & 0x0F,
        channel: (channel_level >> 4) | ((control & layout::CONFIG_CHANNEL_HIGH) << 4),
        serial: control & layout::CONFIG_SERIAL != 0,
        start: control & layout::CONFIG_START != 0,
        ..TriggerStage::default()
    })
}
