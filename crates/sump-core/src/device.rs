//! Command/reply sequencing for one SUMP device.

use std::time::Duration;

use crate::capture::{Capture, CaptureOrder};
use crate::metadata::Metadata;
use crate::protocol::capture::decode_capture;
use crate::protocol::encoder::{ShortCommand, encode_settings};
use crate::protocol::error::ProtocolError;
use crate::protocol::layout;
use crate::protocol::message::decode_messages;
use crate::protocol::metadata::{TokenPolicy, decode_metadata};
use crate::settings::Settings;
use crate::transport::{TimeoutGuard, Transport};
use crate::trigger::TriggerSet;

/// Read timeout applied while the device streams its metadata.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

/// Read timeout for sample data when no capture timeout is configured.
///
/// The largest millisecond count a serial port's poll accepts, so a capture
/// waits for its trigger as long as the device takes.
pub const UNBOUNDED_CAPTURE_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// A SUMP device behind a transport.
///
/// # Examples
/// ```
/// use sump_core::Device;
/// use sump_core::transport::MemoryTransport;
///
/// let mut device = Device::new(MemoryTransport::with_input(b"SLA1"));
/// assert_eq!(device.id_string().unwrap(), "1ALS");
/// assert_eq!(device.transport().written(), &[0x02]);
/// ```
pub struct Device<T: Transport> {
    transport: T,
    capture_timeout: Option<Duration>,
    token_policy: TokenPolicy,
}

impl<T: Transport> Device<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            capture_timeout: None,
            token_policy: TokenPolicy::default(),
        }
    }

    /// Read timeout for sample data; `None` waits for the trigger without a
    /// deadline (`UNBOUNDED_CAPTURE_TIMEOUT`).
    pub fn with_capture_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.capture_timeout = timeout;
        self
    }

    pub fn with_token_policy(mut self, policy: TokenPolicy) -> Self {
        self.token_policy = policy;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    pub fn reset(&mut self) -> Result<(), ProtocolError> {
        self.send(ShortCommand::Reset)
    }

    /// A single reset byte.
    pub fn soft_reset(&mut self) -> Result<(), ProtocolError> {
        self.send(ShortCommand::SoftReset)
    }

    pub fn run(&mut self) -> Result<(), ProtocolError> {
        self.send(ShortCommand::Run)
    }

    pub fn xon(&mut self) -> Result<(), ProtocolError> {
        self.send(ShortCommand::Xon)
    }

    pub fn xoff(&mut self) -> Result<(), ProtocolError> {
        self.send(ShortCommand::Xoff)
    }

    /// The 4-byte ID reply, last byte first (e.g. `"1ALS"`).
    pub fn id_string(&mut self) -> Result<String, ProtocolError> {
        self.send(ShortCommand::Id)?;
        let reply = self.transport.read(layout::ID_REPLY_LEN)?;
        if reply.len() < layout::ID_REPLY_LEN {
            return Err(ProtocolError::TruncatedId {
                needed: layout::ID_REPLY_LEN,
                actual: reply.len(),
            });
        }
        let id: Vec<u8> = reply.into_iter().rev().collect();
        Ok(String::from_utf8_lossy(&id).into_owned())
    }

    /// Encode and write the full configuration.
    ///
    /// Nothing is written when the configuration is invalid.
    pub fn send_settings(
        &mut self,
        settings: &Settings,
        triggers: &TriggerSet,
    ) -> Result<(), ProtocolError> {
        let bytes = encode_settings(settings, triggers)?;
        if log::log_enabled!(log::Level::Debug) {
            for message in decode_messages(&bytes)? {
                log::debug!("-> {}", message);
            }
        }
        self.transport.write(&bytes)?;
        Ok(())
    }

    /// Configure, run and read one capture, then reset the device.
    ///
    /// The reset is sent even when reading the capture failed; the capture
    /// error takes precedence.
    pub fn capture(
        &mut self,
        settings: &Settings,
        triggers: &TriggerSet,
        order: CaptureOrder,
    ) -> Result<Capture, ProtocolError> {
        self.send_settings(settings, triggers)?;
        let result = self.run_and_read(settings, order);
        let reset = self.reset();
        let capture = result?;
        reset?;
        Ok(capture)
    }

    /// Reset the device and read its metadata under `METADATA_TIMEOUT`.
    pub fn query_metadata(&mut self) -> Result<Metadata, ProtocolError> {
        self.reset()?;
        let mut guard = TimeoutGuard::new(&mut self.transport, METADATA_TIMEOUT)?;
        log::debug!("-> metadata");
        guard.write(ShortCommand::Metadata.bytes())?;
        let metadata = decode_metadata(&mut *guard, self.token_policy)?;
        log::info!("received {} metadata entries", metadata.len());
        Ok(metadata)
    }

    fn run_and_read(
        &mut self,
        settings: &Settings,
        order: CaptureOrder,
    ) -> Result<Capture, ProtocolError> {
        let timeout = self.capture_timeout.unwrap_or(UNBOUNDED_CAPTURE_TIMEOUT);
        let mut guard = TimeoutGuard::new(&mut self.transport, timeout)?;
        log::debug!("-> run (read timeout {:?})", timeout);
        guard.write(ShortCommand::Run.bytes())?;
        decode_capture(&mut *guard, settings, order)
    }

    fn send(&mut self, command: ShortCommand) -> Result<(), ProtocolError> {
        log::debug!("-> {:?}", command);
        self.transport.write(command.bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Device, METADATA_TIMEOUT, UNBOUNDED_CAPTURE_TIMEOUT};
    use crate::capture::CaptureOrder;
    use crate::metadata::MetadataValue;
    use crate::protocol::error::ProtocolError;
    use crate::protocol::metadata::TokenPolicy;
    use crate::settings::Settings;
    use crate::transport::{MemoryTransport, Transport};
    use crate::trigger::TriggerSet;

    fn device(input: &[u8]) -> Device<MemoryTransport> {
        let mut transport = MemoryTransport::with_input(input);
        transport.set_timeout(Duration::from_secs(30)).unwrap();
        Device::new(transport)
    }

    #[test]
    fn short_commands() {
        let mut device = device(&[]);
        device.reset().unwrap();
        device.soft_reset().unwrap();
        device.run().unwrap();
        device.xon().unwrap();
        device.xoff().unwrap();
        assert_eq!(
            device.transport().written(),
            &[0, 0, 0, 0, 0, 0, 0x01, 0x11, 0x13]
        );
    }

    #[test]
    fn id_reply_must_be_complete() {
        let mut device = device(b"SL");
        assert!(matches!(
            device.id_string(),
            Err(ProtocolError::TruncatedId {
                needed: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn invalid_settings_write_nothing() {
        let mut device = device(&[]);
        let settings = Settings {
            divider: 0,
            ..Settings::default()
        };
        assert!(device.send_settings(&settings, &TriggerSet::default()).is_err());
        assert!(device.transport().written().is_empty());
    }

    #[test]
    fn capture_sends_settings_run_then_reset() {
        let settings = Settings {
            channel_groups: 0b1110,
            read_count: 4,
            ..Settings::default()
        };
        let triggers = TriggerSet::disabled(1).unwrap();
        let mut device = device(&[4, 3, 2, 1]).with_capture_timeout(Some(Duration::from_secs(5)));
        let capture = device
            .capture(&settings, &triggers, CaptureOrder::LatestFirst)
            .unwrap();
        assert_eq!(capture.chronological(), vec![1, 2, 3, 4]);

        let written = device.transport().written();
        let config_len = 5 * 6;
        assert_eq!(written.len(), config_len + 1 + 5);
        assert_eq!(written[config_len], 0x01);
        assert_eq!(&written[config_len + 1..], &[0; 5]);
        assert_eq!(device.transport().timeout(), Duration::from_secs(30));
        assert!(
            device
                .transport()
                .timeout_history()
                .contains(&Duration::from_secs(5))
        );
    }

    #[test]
    fn failed_capture_still_resets() {
        let settings = Settings {
            channel_groups: 0b1110,
            read_count: 8,
            ..Settings::default()
        };
        let mut device = device(&[1, 2, 3]);
        let err = device
            .capture(&settings, &TriggerSet::default(), CaptureOrder::Arrival)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedCapture { sample: 3, .. }));
        assert!(device.transport().written().ends_with(&[0x01, 0, 0, 0, 0, 0]));
    }

    #[test]
    fn capture_without_timeout_waits_for_trigger() {
        let settings = Settings {
            channel_groups: 0b1110,
            read_count: 4,
            ..Settings::default()
        };
        let mut device = device(&[4, 3, 2, 1]);
        device
            .capture(&settings, &TriggerSet::default(), CaptureOrder::Arrival)
            .unwrap();
        assert_eq!(
            device.transport().timeout_history(),
            &[
                Duration::from_secs(30),
                UNBOUNDED_CAPTURE_TIMEOUT,
                Duration::from_secs(30)
            ]
        );
        assert_eq!(device.transport().timeout(), Duration::from_secs(30));
    }

    #[test]
    fn metadata_uses_scoped_timeout() {
        let mut device = device(&[0x01, b'D', b'e', b'v', 0x00, 0x20, 0, 0, 0, 0x2A, 0x00]);
        let metadata = device.query_metadata().unwrap();
        assert_eq!(metadata.device_name(), Some("Dev"));
        assert_eq!(metadata.get(0x20), Some(&MetadataValue::U32(42)));
        assert_eq!(device.transport().written(), &[0, 0, 0, 0, 0, 0x04]);
        assert_eq!(
            device.transport().timeout_history(),
            &[
                Duration::from_secs(30),
                METADATA_TIMEOUT,
                Duration::from_secs(30)
            ]
        );
    }

    #[test]
    fn metadata_timeout_restored_on_error() {
        let mut device = device(&[0x21, 0x00]).with_token_policy(TokenPolicy::Strict);
        assert!(matches!(
            device.query_metadata(),
            Err(ProtocolError::TruncatedMetadata { key: 0x21 })
        ));
        assert_eq!(device.transport().timeout(), Duration::from_secs(30));
    }
}
