//! Device metadata as reported by the metadata query.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const KEY_DEVICE_NAME: u8 = 0x01;
pub const KEY_FPGA_VERSION: u8 = 0x02;
pub const KEY_ANCILLARY_VERSION: u8 = 0x03;
pub const KEY_PROBE_COUNT: u8 = 0x20;
pub const KEY_SAMPLE_MEMORY: u8 = 0x21;
pub const KEY_DYNAMIC_MEMORY: u8 = 0x22;
pub const KEY_MAX_SAMPLE_RATE: u8 = 0x23;
pub const KEY_PROTOCOL_VERSION: u8 = 0x24;
pub const KEY_PROBE_COUNT_SHORT: u8 = 0x40;
pub const KEY_PROTOCOL_VERSION_SHORT: u8 = 0x41;

const KNOWN_KEYS: &[(u8, &str)] = &[
    (KEY_DEVICE_NAME, "device name"),
    (KEY_FPGA_VERSION, "FPGA firmware version"),
    (KEY_ANCILLARY_VERSION, "ancillary firmware version"),
    (KEY_PROBE_COUNT, "probe count"),
    (KEY_SAMPLE_MEMORY, "sample memory"),
    (KEY_DYNAMIC_MEMORY, "dynamic memory"),
    (KEY_MAX_SAMPLE_RATE, "max sample rate"),
    (KEY_PROTOCOL_VERSION, "protocol version"),
    (KEY_PROBE_COUNT_SHORT, "probe count"),
    (KEY_PROTOCOL_VERSION_SHORT, "protocol version"),
];

/// Human-readable name of a standard metadata key.
pub fn key_name(key: u8) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .find(|(known, _)| *known == key)
        .map(|(_, name)| *name)
}

/// Typed value following a metadata token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MetadataValue {
    Text(String),
    U32(u32),
    U8(u8),
    /// Token without a value.
    Flag,
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            MetadataValue::U32(value) => Some(*value),
            MetadataValue::U8(value) => Some(u32::from(*value)),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(text) => f.write_str(text),
            MetadataValue::U32(value) => write!(f, "{value}"),
            MetadataValue::U8(value) => write!(f, "{value}"),
            MetadataValue::Flag => f.write_str("(flag)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: u8,
    pub value: MetadataValue,
}

/// Metadata entries in arrival order; repeated keys are kept.
///
/// # Examples
/// ```
/// use sump_core::{Metadata, MetadataValue};
///
/// let metadata = Metadata::from_pairs(vec![
///     (0x01, MetadataValue::Text("Logic Sniffer".to_string())),
///     (0x40, MetadataValue::U8(32)),
/// ]);
/// assert_eq!(metadata.device_name(), Some("Logic Sniffer"));
/// assert_eq!(metadata.probe_count(), Some(32));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: Vec<MetadataEntry>,
}

impl Metadata {
    pub fn from_pairs(pairs: Vec<(u8, MetadataValue)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(key, value)| MetadataEntry { key, value })
                .collect(),
        }
    }

    pub(crate) fn push(&mut self, key: u8, value: MetadataValue) {
        self.entries.push(MetadataEntry { key, value });
    }

    pub fn entries(&self) -> &[MetadataEntry] {
        &self.entries
    }

    pub fn pairs(&self) -> Vec<(u8, MetadataValue)> {
        self.entries
            .iter()
            .map(|entry| (entry.key, entry.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First value reported for `key`.
    pub fn get(&self, key: u8) -> Option<&MetadataValue> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    pub fn device_name(&self) -> Option<&str> {
        self.get(KEY_DEVICE_NAME).and_then(MetadataValue::as_text)
    }

    pub fn fpga_version(&self) -> Option<&str> {
        self.get(KEY_FPGA_VERSION).and_then(MetadataValue::as_text)
    }

    pub fn probe_count(&self) -> Option<u32> {
        self.first_u32(&[KEY_PROBE_COUNT_SHORT, KEY_PROBE_COUNT])
    }

    pub fn sample_memory(&self) -> Option<u32> {
        self.first_u32(&[KEY_SAMPLE_MEMORY])
    }

    pub fn max_sample_rate(&self) -> Option<u32> {
        self.first_u32(&[KEY_MAX_SAMPLE_RATE])
    }

    pub fn protocol_version(&self) -> Option<u32> {
        self.first_u32(&[KEY_PROTOCOL_VERSION_SHORT, KEY_PROTOCOL_VERSION])
    }

    fn first_u32(&self, keys: &[u8]) -> Option<u32> {
        keys.iter()
            .find_map(|key| self.get(*key).and_then(MetadataValue::as_u32))
    }
}
