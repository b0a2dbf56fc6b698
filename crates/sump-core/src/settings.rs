//! Device configuration sent ahead of every capture.
//!
//! `Settings` is a plain value: build it with struct-update syntax over
//! `Settings::default()` (or deserialize it with missing fields defaulted),
//! then hand it by reference to the encoder. Counts are normalized at encode
//! time, never on construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Undivided sample clock of the reference hardware, in Hz.
pub const CLOCK_RATE: u64 = 100_000_000;
/// Number of byte lanes a SUMP sample word can carry.
pub const MAX_CHANNEL_GROUPS: u8 = 4;
/// Largest value representable in the 24-bit divider field.
pub const MAX_DIVIDER_FIELD: u32 = 0x00FF_FFFF;

/// Errors raised when a configuration cannot be represented on the wire.
///
/// # Examples
/// ```
/// use sump_core::ConfigError;
///
/// let err = ConfigError::ZeroDivider;
/// assert!(err.to_string().contains("divider"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("divider must be at least 1")]
    ZeroDivider,
    #[error("divider {divider} does not fit in the 24-bit divider field")]
    DividerTooLarge { divider: u32 },
    #[error("{field} {count} does not fit in the 16-bit count field")]
    CountTooLarge { field: &'static str, count: u32 },
    #[error("channel group mask 0x{mask:02x} has bits above the 4 lanes")]
    ChannelGroups { mask: u8 },
    #[error("max channel groups must be within 1..=4, got {value}")]
    MaxChannelGroups { value: u8 },
    #[error("trigger stage count must be within 1..=4, got {count}")]
    StageCount { count: usize },
    #[error("{given} trigger stages supplied for a {n_stages}-stage trigger")]
    TooManyStages { given: usize, n_stages: usize },
    #[error("trigger stage {stage}: serial channel {channel} is outside 0..=31")]
    StageChannel { stage: usize, channel: u8 },
    #[error("trigger stage {stage}: level {level} is outside 0..=3")]
    StageLevel { stage: usize, level: u8 },
}

/// Sampling configuration for one capture.
///
/// # Examples
/// ```
/// use sump_core::Settings;
///
/// let settings = Settings {
///     divider: 4,
///     demux: true,
///     ..Settings::default()
/// };
/// assert_eq!(settings.sample_rate().unwrap(), 50_000_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Sample-clock divisor; the device stores `divider - 1`.
    pub divider: u32,
    /// Samples to read back after the trigger fires.
    pub read_count: u32,
    /// Samples to wait after the trigger before stopping.
    pub delay_count: u32,
    /// Lane mask: bit `i` set excludes byte lane `i` from samples.
    pub channel_groups: u8,
    /// Sample on both clock edges, doubling the sample rate.
    pub demux: bool,
    /// Enable the device's noise filter.
    pub filter: bool,
    /// Use the external clock input.
    pub external: bool,
    /// Invert the external clock.
    pub inverted: bool,
    /// Byte lanes the device implements; lanes at or above this count are
    /// never read.
    pub max_channel_groups: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            divider: 2,
            read_count: 4096,
            delay_count: 2048,
            channel_groups: 0,
            demux: false,
            filter: false,
            external: false,
            inverted: false,
            max_channel_groups: MAX_CHANNEL_GROUPS,
        }
    }
}

impl Settings {
    /// Check every field against the width of its wire representation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.divider == 0 {
            return Err(ConfigError::ZeroDivider);
        }
        if self.divider - 1 > MAX_DIVIDER_FIELD {
            return Err(ConfigError::DividerTooLarge {
                divider: self.divider,
            });
        }
        check_count("read count", self.read_count)?;
        check_count("delay count", self.delay_count)?;
        if self.channel_groups > 0x0F {
            return Err(ConfigError::ChannelGroups {
                mask: self.channel_groups,
            });
        }
        if self.max_channel_groups == 0 || self.max_channel_groups > MAX_CHANNEL_GROUPS {
            return Err(ConfigError::MaxChannelGroups {
                value: self.max_channel_groups,
            });
        }
        Ok(())
    }

    /// Effective sample rate in Hz.
    pub fn sample_rate(&self) -> Result<u64, ConfigError> {
        if self.divider == 0 {
            return Err(ConfigError::ZeroDivider);
        }
        let rate = CLOCK_RATE / u64::from(self.divider);
        Ok(if self.demux { rate * 2 } else { rate })
    }

    /// Read count rounded down to the device's granularity of 4 samples.
    pub fn normalized_read_count(&self) -> u32 {
        normalize_count(self.read_count)
    }

    /// Delay count rounded down to the device's granularity of 4 samples.
    pub fn normalized_delay_count(&self) -> u32 {
        normalize_count(self.delay_count)
    }

    /// Byte lanes present in every sample, in ascending order.
    ///
    /// # Examples
    /// ```
    /// use sump_core::Settings;
    ///
    /// let settings = Settings {
    ///     channel_groups: 0b1010,
    ///     ..Settings::default()
    /// };
    /// assert_eq!(settings.enabled_lanes(), vec![0, 2]);
    /// ```
    pub fn enabled_lanes(&self) -> Vec<u8> {
        (0..self.max_channel_groups.min(MAX_CHANNEL_GROUPS))
            .filter(|lane| self.channel_groups & (1 << lane) == 0)
            .collect()
    }
}

pub(crate) fn normalize_count(count: u32) -> u32 {
    count & !0b11
}

fn check_count(field: &'static str, count: u32) -> Result<(), ConfigError> {
    if normalize_count(count) >> 2 > u32::from(u16::MAX) {
        return Err(ConfigError::CountTooLarge { field, count });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, Settings};

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.divider, 2);
        assert_eq!(settings.read_count, 4096);
        assert_eq!(settings.delay_count, 2048);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_divider_is_rejected() {
        let settings = Settings {
            divider: 0,
            ..Settings::default()
        };
        assert_eq!(settings.validate(), Err(ConfigError::ZeroDivider));
        assert_eq!(settings.sample_rate(), Err(ConfigError::ZeroDivider));
    }

    #[test]
    fn divider_field_is_24_bits() {
        let ok = Settings {
            divider: 0x0100_0000,
            ..Settings::default()
        };
        assert!(ok.validate().is_ok());

        let too_large = Settings {
            divider: 0x0100_0001,
            ..Settings::default()
        };
        assert!(matches!(
            too_large.validate(),
            Err(ConfigError::DividerTooLarge { .. })
        ));
    }

    #[test]
    fn count_must_fit_after_rounding() {
        let largest = Settings {
            read_count: 0x3_FFFF,
            ..Settings::default()
        };
        assert!(largest.validate().is_ok());

        let overflow = Settings {
            delay_count: 0x4_0000,
            ..Settings::default()
        };
        assert_eq!(
            overflow.validate(),
            Err(ConfigError::CountTooLarge {
                field: "delay count",
                count: 0x4_0000,
            })
        );
    }

    #[test]
    fn normalization_rounds_down() {
        let settings = Settings {
            read_count: 4099,
            delay_count: 3,
            ..Settings::default()
        };
        assert_eq!(settings.normalized_read_count(), 4096);
        assert_eq!(settings.normalized_delay_count(), 0);
    }

    #[test]
    fn sample_rate_doubles_with_demux() {
        let plain = Settings {
            divider: 5,
            ..Settings::default()
        };
        assert_eq!(plain.sample_rate().unwrap(), 20_000_000);
        let demux = Settings {
            demux: true,
            ..plain
        };
        assert_eq!(demux.sample_rate().unwrap(), 40_000_000);
    }

    #[test]
    fn lanes_follow_mask_and_group_limit() {
        let all = Settings::default();
        assert_eq!(all.enabled_lanes(), vec![0, 1, 2, 3]);

        let none = Settings {
            channel_groups: 0b1111,
            ..Settings::default()
        };
        assert!(none.enabled_lanes().is_empty());

        let two_groups = Settings {
            max_channel_groups: 2,
            channel_groups: 0b0001,
            ..Settings::default()
        };
        assert_eq!(two_groups.enabled_lanes(), vec![1]);
    }

    #[test]
    fn partial_json_overlays_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"divider": 10, "channel_groups": 14}"#).unwrap();
        assert_eq!(settings.divider, 10);
        assert_eq!(settings.channel_groups, 0b1110);
        assert_eq!(settings.read_count, 4096);
        assert!(!settings.demux);
    }

    #[test]
    fn mask_wider_than_lanes_is_rejected() {
        let settings = Settings {
            channel_groups: 0x10,
            ..Settings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(ConfigError::ChannelGroups { mask: 0x10 })
        );
    }
}
