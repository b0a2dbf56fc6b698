//! Settings and trigger encoding.
//!
//! Every function here is pure. `encode_settings` validates the whole
//! configuration before producing a single byte, so a caller that writes its
//! result never sends half a configuration.

use super::error::ProtocolError;
use super::layout;
use crate::settings::{ConfigError, Settings};
use crate::trigger::{MAX_TRIGGER_STAGES, TriggerMode, TriggerSet, TriggerStage};

/// Single-byte (or repeated single-byte) commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortCommand {
    Reset,
    /// One reset byte; enough to abort a run in progress.
    SoftReset,
    Run,
    Id,
    Metadata,
    Xon,
    Xoff,
}

impl ShortCommand {
    pub fn bytes(self) -> &'static [u8] {
        match self {
            ShortCommand::Reset => &[layout::CMD_RESET; layout::RESET_REPEAT],
            ShortCommand::SoftReset => &[layout::CMD_RESET],
            ShortCommand::Run => &[layout::CMD_RUN],
            ShortCommand::Id => &[layout::CMD_ID],
            ShortCommand::Metadata => &[layout::CMD_METADATA],
            ShortCommand::Xon => &[layout::CMD_XON],
            ShortCommand::Xoff => &[layout::CMD_XOFF],
        }
    }
}

pub type LongCommand = [u8; layout::LONG_COMMAND_LEN];

/// Divider message; the device counts from zero.
pub fn encode_divider(settings: &Settings) -> Result<LongCommand, ConfigError> {
    if settings.divider == 0 {
        return Err(ConfigError::ZeroDivider);
    }
    let sent = settings.divider - 1;
    if sent > crate::settings::MAX_DIVIDER_FIELD {
        return Err(ConfigError::DividerTooLarge {
            divider: settings.divider,
        });
    }
    let low = ((sent & 0xFFFF) as u16).to_le_bytes();
    Ok([layout::CMD_DIVIDER, low[0], low[1], (sent >> 16) as u8, 0x00])
}

/// Read and delay counts, in units of 4 samples.
pub fn encode_counts(settings: &Settings) -> LongCommand {
    let read = count_field(settings.normalized_read_count()).to_le_bytes();
    let delay = count_field(settings.normalized_delay_count()).to_le_bytes();
    [layout::CMD_COUNTS, read[0], read[1], delay[0], delay[1]]
}

/// Flags message. RLE, alternate numbering and test modes stay off.
pub fn encode_flags(settings: &Settings) -> LongCommand {
    let mut flags = (settings.channel_groups << layout::FLAG_CHANNEL_GROUPS_SHIFT)
        & layout::FLAG_CHANNEL_GROUPS_MASK;
    if settings.demux {
        flags |= layout::FLAG_DEMUX;
    }
    if settings.filter {
        flags |= layout::FLAG_FILTER;
    }
    if settings.external {
        flags |= layout::FLAG_EXTERNAL;
    }
    if settings.inverted {
        flags |= layout::FLAG_INVERTED;
    }
    [layout::CMD_FLAGS, flags, 0x00, 0x00, 0x00]
}

// Stage indices come from a validated `TriggerSet`, so they are below
// `MAX_TRIGGER_STAGES`.
pub(crate) fn encode_trigger_mask(stage: usize, mask: u32) -> LongCommand {
    with_u32(trigger_opcode(stage, layout::TRIGGER_KIND_MASK_WORD), mask)
}

pub(crate) fn encode_trigger_value(stage: usize, value: u32) -> LongCommand {
    with_u32(trigger_opcode(stage, layout::TRIGGER_KIND_VALUE), value)
}

pub(crate) fn encode_trigger_config(stage: usize, config: &TriggerStage) -> LongCommand {
    let delay = config.delay.to_le_bytes();
    let channel_level = ((config.channel & 0x0F) << 4) | (config.level & 0x0F);
    let mut control = (config.channel & 0x10) >> 4;
    if config.start {
        control |= layout::CONFIG_START;
    }
    if config.serial {
        control |= layout::CONFIG_SERIAL;
    }
    [
        trigger_opcode(stage, layout::TRIGGER_KIND_CONFIG),
        delay[0],
        delay[1],
        channel_level,
        control,
    ]
}

fn trigger_opcode(stage: usize, kind: u8) -> u8 {
    debug_assert!(stage < MAX_TRIGGER_STAGES);
    let stage = (stage & 0b11) as u8;
    layout::TRIGGER_OPCODE_BASE | (stage << layout::TRIGGER_STAGE_SHIFT) | kind
}

/// Full configuration in device order: divider, triggers, counts, flags.
///
/// # Examples
/// ```
/// use sump_core::protocol::encode_settings;
/// use sump_core::{Settings, TriggerSet};
///
/// let bytes = encode_settings(&Settings::default(), &TriggerSet::default()).unwrap();
/// assert_eq!(&bytes[..5], &[0x80, 0x01, 0x00, 0x00, 0x00]);
/// assert_eq!(bytes.len(), 5 * (3 + 3 * 4));
/// ```
pub fn encode_settings(
    settings: &Settings,
    triggers: &TriggerSet,
) -> Result<Vec<u8>, ProtocolError> {
    settings.validate()?;
    triggers.validate()?;

    let n_stages = triggers.n_stages();
    let mut out = Vec::with_capacity(layout::LONG_COMMAND_LEN * (3 + 3 * n_stages));
    out.extend_from_slice(&encode_divider(settings)?);
    for command in trigger_commands(triggers) {
        out.extend_from_slice(&command);
    }
    out.extend_from_slice(&encode_counts(settings));
    out.extend_from_slice(&encode_flags(settings));
    Ok(out)
}

/// Same as `encode_settings` with the trigger mode given by name.
pub fn encode_settings_with_mode(
    settings: &Settings,
    mode: &str,
    stages: Vec<TriggerStage>,
    n_stages: usize,
) -> Result<Vec<u8>, ProtocolError> {
    let mode: TriggerMode = mode.parse()?;
    let triggers = match mode {
        TriggerMode::Disabled => TriggerSet::disabled(n_stages)?,
        TriggerMode::Simple => {
            TriggerSet::simple(stages.first().copied().unwrap_or_default(), n_stages)?
        }
        TriggerMode::Complex => TriggerSet::complex(stages, n_stages)?,
    };
    encode_settings(settings, &triggers)
}

/// Trigger messages for every stage, in the order the mode requires.
pub fn trigger_commands(triggers: &TriggerSet) -> Vec<LongCommand> {
    let mut out = Vec::with_capacity(3 * triggers.n_stages());
    match triggers.mode() {
        TriggerMode::Disabled => {
            for stage in 0..triggers.n_stages() {
                out.extend(parked_stage(stage, true));
            }
        }
        TriggerMode::Simple => {
            let first = triggers.stages()[0];
            let config = TriggerStage {
                level: 0,
                start: true,
                ..first
            };
            out.push(encode_trigger_config(0, &config));
            out.push(encode_trigger_mask(0, first.mask));
            out.push(encode_trigger_value(0, first.value));
            for stage in 1..triggers.n_stages() {
                out.extend(parked_stage(stage, false));
            }
        }
        TriggerMode::Complex => {
            // mask and value must reach the device before the config
            for (stage, config) in triggers.stages().iter().enumerate() {
                out.push(encode_trigger_mask(stage, config.mask));
                out.push(encode_trigger_value(stage, config.value));
                out.push(encode_trigger_config(stage, config));
            }
        }
    }
    out
}

fn parked_stage(stage: usize, start: bool) -> [LongCommand; 3] {
    [
        encode_trigger_config(stage, &TriggerStage::disabled(0, start)),
        encode_trigger_mask(stage, 0),
        encode_trigger_value(stage, 0),
    ]
}

fn count_field(normalized: u32) -> u16 {
    ((normalized + 3) >> 2) as u16
}

fn with_u32(opcode: u8, value: u32) -> LongCommand {
    let bytes = value.to_le_bytes();
    [opcode, bytes[0], bytes[1], bytes[2], bytes[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_fixtures() {
        let settings = Settings::default();
        assert_eq!(encode_divider(&settings).unwrap(), [0x80, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(encode_counts(&settings), [0x81, 0x00, 0x04, 0x00, 0x02]);
        assert_eq!(encode_flags(&settings), [0x82, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn divider_spans_three_bytes() {
        let settings = Settings {
            divider: 0x0012_3457,
            ..Settings::default()
        };
        assert_eq!(encode_divider(&settings).unwrap(), [0x80, 0x56, 0x34, 0x12, 0x00]);
    }

    #[test]
    fn zero_divider_fails() {
        let settings = Settings {
            divider: 0,
            ..Settings::default()
        };
        assert_eq!(encode_divider(&settings), Err(ConfigError::ZeroDivider));
    }

    #[test]
    fn counts_round_down_before_division() {
        let settings = Settings {
            read_count: 4103,
            delay_count: 9,
            ..Settings::default()
        };
        // 4103 -> 4100 -> 1025, 9 -> 8 -> 2
        assert_eq!(encode_counts(&settings), [0x81, 0x01, 0x04, 0x02, 0x00]);
    }

    #[test]
    fn flags_pack_every_bit() {
        let settings = Settings {
            channel_groups: 0b1010,
            demux: true,
            filter: true,
            external: true,
            inverted: true,
            ..Settings::default()
        };
        assert_eq!(encode_flags(&settings), [0x82, 0b1110_1011, 0, 0, 0]);
    }

    #[test]
    fn trigger_opcodes_select_stage() {
        assert_eq!(encode_trigger_mask(0, 0x0102_0304), [0xC0, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(encode_trigger_value(3, 0xFF), [0xCD, 0xFF, 0, 0, 0]);
        let config = TriggerStage {
            delay: 0x0102,
            channel: 0x13,
            level: 2,
            serial: true,
            start: true,
            ..TriggerStage::default()
        };
        assert_eq!(
            encode_trigger_config(1, &config),
            [0xC6, 0x02, 0x01, 0x32, 0b0000_1101]
        );
        assert_eq!(encode_trigger_mask(3, 0)[0], 0xCC);
        assert_eq!(encode_trigger_value(1, 0)[0], 0xC5);
        assert_eq!(encode_trigger_config(3, &TriggerStage::default())[0], 0xCE);
    }

    #[test]
    fn disabled_mode_order_is_config_mask_value() {
        let commands = trigger_commands(&TriggerSet::disabled(2).unwrap());
        assert_eq!(
            commands,
            vec![
                [0xC2, 0, 0, 0, 0x08],
                [0xC0, 0, 0, 0, 0],
                [0xC1, 0, 0, 0, 0],
                [0xC6, 0, 0, 0, 0x08],
                [0xC4, 0, 0, 0, 0],
                [0xC5, 0, 0, 0, 0],
            ]
        );
    }

    #[test]
    fn simple_mode_sends_stage_zero_then_parks() {
        let stage = TriggerStage {
            mask: 0x0F,
            value: 0x05,
            delay: 3,
            channel: 4,
            serial: true,
            ..TriggerStage::default()
        };
        let commands = trigger_commands(&TriggerSet::simple(stage, 3).unwrap());
        assert_eq!(commands[0], [0xC2, 0x03, 0x00, 0x40, 0x0C]);
        assert_eq!(commands[1], [0xC0, 0x0F, 0, 0, 0]);
        assert_eq!(commands[2], [0xC1, 0x05, 0, 0, 0]);
        assert_eq!(commands[3], [0xC6, 0, 0, 0, 0]);
        assert_eq!(commands[6], [0xCA, 0, 0, 0, 0]);
        assert_eq!(commands.len(), 9);
    }

    #[test]
    fn complex_mode_order_is_mask_value_config() {
        let stage = TriggerStage {
            mask: 1,
            value: 1,
            start: true,
            ..TriggerStage::default()
        };
        let commands = trigger_commands(&TriggerSet::complex(vec![stage], 1).unwrap());
        assert_eq!(
            commands,
            vec![
                [0xC0, 1, 0, 0, 0],
                [0xC1, 1, 0, 0, 0],
                [0xC2, 0, 0, 0, 0x08],
            ]
        );
    }

    #[test]
    fn settings_order_is_divider_triggers_counts_flags() {
        let triggers = TriggerSet::disabled(1).unwrap();
        let bytes = encode_settings(&Settings::default(), &triggers).unwrap();
        let opcodes: Vec<u8> = bytes.chunks(5).map(|chunk| chunk[0]).collect();
        assert_eq!(opcodes, vec![0x80, 0xC2, 0xC0, 0xC1, 0x81, 0x82]);
    }

    #[test]
    fn invalid_settings_produce_no_bytes() {
        let settings = Settings {
            channel_groups: 0x1F,
            ..Settings::default()
        };
        let err = encode_settings(&settings, &TriggerSet::default()).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Config(ConfigError::ChannelGroups { mask: 0x1F })
        ));
    }

    #[test]
    fn unknown_mode_name_fails_before_encoding() {
        let err =
            encode_settings_with_mode(&Settings::default(), "edge", Vec::new(), 4).unwrap_err();
        assert!(matches!(err, ProtocolError::TriggerMode(_)));
    }

    #[test]
    fn short_commands() {
        assert_eq!(ShortCommand::Reset.bytes(), &[0, 0, 0, 0, 0]);
        assert_eq!(ShortCommand::Run.bytes(), &[0x01]);
        assert_eq!(ShortCommand::Id.bytes(), &[0x02]);
        assert_eq!(ShortCommand::Metadata.bytes(), &[0x04]);
        assert_eq!(ShortCommand::Xon.bytes(), &[0x11]);
        assert_eq!(ShortCommand::Xoff.bytes(), &[0x13]);
    }
}
