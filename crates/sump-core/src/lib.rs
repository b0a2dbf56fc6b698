//! Host-side codec for SUMP-compatible logic analyzers.
//!
//! This crate turns a capture configuration (`Settings` plus a `TriggerSet`)
//! into the byte commands a SUMP device expects, and turns the device's
//! replies (sample stream, ID, metadata tokens) back into typed values.
//! Encoding is pure; decoding reads from a `Transport` and never writes.
//! `Device` sequences commands and replies over any transport, and
//! `CaptureFile` stores a capture with the configuration that produced it.
//!
//! Invariants:
//! - Nothing is encoded for an invalid configuration.
//! - Samples keep their device-arrival order; `CaptureOrder` says what it is.
//! - A temporary read timeout is always restored, even on error.
//!
//! # Examples
//! ```
//! use sump_core::protocol::decode_capture;
//! use sump_core::transport::MemoryTransport;
//! use sump_core::{CaptureOrder, Settings};
//!
//! let settings = Settings {
//!     read_count: 4,
//!     channel_groups: 0b1110,
//!     ..Settings::default()
//! };
//! let mut transport = MemoryTransport::with_input(&[4, 3, 2, 1]);
//! let capture = decode_capture(&mut transport, &settings, CaptureOrder::LatestFirst)?;
//! assert_eq!(capture.chronological(), vec![1, 2, 3, 4]);
//! # Ok::<(), sump_core::ProtocolError>(())
//! ```

mod capture;
mod device;
mod settings;
mod store;
mod trigger;

pub mod metadata;
pub mod protocol;
pub mod transport;

pub use capture::{Capture, CaptureOrder, FieldSpec, FieldSpecError};
pub use device::{Device, METADATA_TIMEOUT, UNBOUNDED_CAPTURE_TIMEOUT};
pub use metadata::{Metadata, MetadataEntry, MetadataValue, key_name};
pub use protocol::ProtocolError;
pub use settings::{CLOCK_RATE, ConfigError, MAX_CHANNEL_GROUPS, MAX_DIVIDER_FIELD, Settings};
pub use store::{CaptureFile, DEFAULT_CAPTURED_AT, FORMAT_VERSION, StoreError, ToolInfo};
pub use trigger::{
    MAX_TRIGGER_CHANNEL, MAX_TRIGGER_LEVEL, MAX_TRIGGER_STAGES, TriggerMode, TriggerModeError,
    TriggerSet, TriggerStage,
};
