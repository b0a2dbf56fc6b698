//! Captured samples and per-sample field extraction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order in which the device sent the samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureOrder {
    /// Oldest sample first.
    Arrival,
    /// Most recent sample first (the usual SUMP behaviour).
    #[default]
    LatestFirst,
}

/// Sample words in the order they arrived from the device.
///
/// # Examples
/// ```
/// use sump_core::{Capture, CaptureOrder};
///
/// let capture = Capture::new(vec![3, 2, 1], 1, CaptureOrder::LatestFirst);
/// assert_eq!(capture.arrival(), &[3, 2, 1]);
/// assert_eq!(capture.chronological(), vec![1, 2, 3]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    /// How the device ordered the samples.
    pub order: CaptureOrder,
    /// Bytes per sample word (number of enabled lanes).
    pub word_width: u8,
    samples: Vec<u32>,
}

impl Capture {
    pub fn new(samples: Vec<u32>, word_width: u8, order: CaptureOrder) -> Self {
        Self {
            order,
            word_width,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples exactly as they were read.
    pub fn arrival(&self) -> &[u32] {
        &self.samples
    }

    /// Samples oldest first, whatever order the device used.
    pub fn chronological(&self) -> Vec<u32> {
        match self.order {
            CaptureOrder::Arrival => self.samples.clone(),
            CaptureOrder::LatestFirst => self.samples.iter().rev().copied().collect(),
        }
    }

    /// Value of `field` for every sample, oldest first.
    ///
    /// # Examples
    /// ```
    /// use sump_core::{Capture, CaptureOrder, FieldSpec};
    ///
    /// let capture = Capture::new(vec![0x1234, 0xABCD], 2, CaptureOrder::Arrival);
    /// let high: FieldSpec = "8:8".parse().unwrap();
    /// assert_eq!(capture.extract(&high), vec![0x12, 0xAB]);
    /// ```
    pub fn extract(&self, field: &FieldSpec) -> Vec<u32> {
        self.chronological()
            .into_iter()
            .map(|sample| field.extract(sample))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldSpecError {
    #[error("invalid field spec '{0}' (expected BIT or START:LENGTH)")]
    Syntax(String),
    #[error("field {start}:{len} does not fit in a 32-bit sample")]
    OutOfRange { start: u8, len: u8 },
}

/// A slice of the sample word: one bit or a run of bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSpec {
    Bit(u8),
    Range { start: u8, len: u8 },
}

impl FieldSpec {
    pub fn range(start: u8, len: u8) -> Result<Self, FieldSpecError> {
        if len == 0 || u32::from(start) + u32::from(len) > 32 {
            return Err(FieldSpecError::OutOfRange { start, len });
        }
        Ok(FieldSpec::Range { start, len })
    }

    pub fn bit(index: u8) -> Result<Self, FieldSpecError> {
        if index >= 32 {
            return Err(FieldSpecError::OutOfRange {
                start: index,
                len: 1,
            });
        }
        Ok(FieldSpec::Bit(index))
    }

    pub fn extract(&self, sample: u32) -> u32 {
        match *self {
            FieldSpec::Bit(index) => (sample >> index) & 1,
            FieldSpec::Range { start, len } => {
                let mask = if len >= 32 { u32::MAX } else { (1u32 << len) - 1 };
                (sample >> start) & mask
            }
        }
    }
}

impl FromStr for FieldSpec {
    type Err = FieldSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let syntax = || FieldSpecError::Syntax(s.to_string());
        match s.trim().split_once(':') {
            Some((start, len)) => {
                let start = start.trim().parse::<u8>().map_err(|_| syntax())?;
                let len = len.trim().parse::<u8>().map_err(|_| syntax())?;
                FieldSpec::range(start, len)
            }
            None => FieldSpec::bit(s.trim().parse::<u8>().map_err(|_| syntax())?),
        }
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSpec::Bit(index) => write!(f, "{index}"),
            FieldSpec::Range { start, len } => write!(f, "{start}:{len}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Capture, CaptureOrder, FieldSpec, FieldSpecError};

    #[test]
    fn arrival_order_is_already_chronological() {
        let capture = Capture::new(vec![1, 2, 3], 1, CaptureOrder::Arrival);
        assert_eq!(capture.chronological(), vec![1, 2, 3]);
        assert_eq!(capture.len(), 3);
    }

    #[test]
    fn parse_bit_and_range() {
        assert_eq!("7".parse::<FieldSpec>().unwrap(), FieldSpec::Bit(7));
        assert_eq!(
            "0:16".parse::<FieldSpec>().unwrap(),
            FieldSpec::Range { start: 0, len: 16 }
        );
        assert_eq!(
            " 24 : 8 ".parse::<FieldSpec>().unwrap(),
            FieldSpec::Range { start: 24, len: 8 }
        );
    }

    #[test]
    fn reject_bad_specs() {
        assert!(matches!(
            "x".parse::<FieldSpec>(),
            Err(FieldSpecError::Syntax(_))
        ));
        assert!(matches!(
            "16:17".parse::<FieldSpec>(),
            Err(FieldSpecError::OutOfRange { start: 16, len: 17 })
        ));
        assert!(matches!(
            "3:0".parse::<FieldSpec>(),
            Err(FieldSpecError::OutOfRange { .. })
        ));
        assert!("32".parse::<FieldSpec>().is_err());
    }

    #[test]
    fn extract_fields() {
        let sample = 0x8000_00F1;
        assert_eq!(FieldSpec::Bit(0).extract(sample), 1);
        assert_eq!(FieldSpec::Bit(1).extract(sample), 0);
        assert_eq!(FieldSpec::Bit(31).extract(sample), 1);
        assert_eq!(FieldSpec::Range { start: 4, len: 4 }.extract(sample), 0xF);
        assert_eq!(FieldSpec::Range { start: 0, len: 32 }.extract(sample), sample);
    }

    #[test]
    fn extract_uses_chronological_order() {
        let capture = Capture::new(vec![0b10, 0b01], 1, CaptureOrder::LatestFirst);
        assert_eq!(capture.extract(&FieldSpec::Bit(0)), vec![1, 0]);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for text in ["5", "8:8"] {
            let spec: FieldSpec = text.parse().unwrap();
            assert_eq!(spec.to_string(), text);
        }
    }
}
