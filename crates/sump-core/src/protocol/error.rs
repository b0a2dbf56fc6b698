use thiserror::Error;

use crate::settings::ConfigError;
use crate::trigger::TriggerModeError;

/// Errors returned by encoding, decoding and device exchanges.
///
/// # Examples
/// ```
/// use sump_core::ProtocolError;
///
/// let err = ProtocolError::TruncatedCapture {
///     sample: 3,
///     lane: 1,
///     expected_samples: 8,
/// };
/// assert!(err.to_string().contains("capture truncated"));
/// ```
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid settings: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    TriggerMode(#[from] TriggerModeError),
    #[error("capture truncated at sample {sample} lane {lane} (expected {expected_samples} samples)")]
    TruncatedCapture {
        sample: usize,
        lane: u8,
        expected_samples: usize,
    },
    #[error("metadata truncated inside the value of key 0x{key:02x}")]
    TruncatedMetadata { key: u8 },
    #[error("unknown metadata key 0x{key:02x}")]
    UnknownMetadataKey { key: u8 },
    #[error("device ID reply truncated: need {needed} bytes, got {actual}")]
    TruncatedId { needed: usize, actual: usize },
    #[error("unknown command opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    #[error("command truncated: need {needed} bytes, got {actual}")]
    TruncatedCommand { needed: usize, actual: usize },
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}
