//! Metadata token stream decoding.
//!
//! The token's range selects the value that follows it: NUL-terminated text,
//! a big-endian u32, a single byte, or nothing at all. A zero token or the
//! end of the stream finishes the list.

use super::error::ProtocolError;
use super::layout;
use super::reader::StreamReader;
use crate::metadata::{Metadata, MetadataValue};
use crate::transport::Transport;

/// How tokens above the typed ranges are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenPolicy {
    /// Treat them as flags without a value.
    #[default]
    Lenient,
    /// Reject them with `UnknownMetadataKey`.
    Strict,
}

/// Decode metadata tokens until the terminator or end of stream.
///
/// # Examples
/// ```
/// use sump_core::protocol::{TokenPolicy, decode_metadata};
/// use sump_core::transport::MemoryTransport;
/// use sump_core::MetadataValue;
///
/// let mut transport = MemoryTransport::with_input(&[0x41, 0x02, 0x00]);
/// let metadata = decode_metadata(&mut transport, TokenPolicy::Lenient).unwrap();
/// assert_eq!(metadata.pairs(), vec![(0x41, MetadataValue::U8(2))]);
/// ```
pub fn decode_metadata<T: Transport + ?Sized>(
    transport: &mut T,
    policy: TokenPolicy,
) -> Result<Metadata, ProtocolError> {
    let mut reader = StreamReader::new(transport);
    let mut metadata = Metadata::default();

    loop {
        let token = match reader.read_u8()? {
            Some(layout::METADATA_END) => break,
            Some(token) => token,
            None => {
                log::debug!("metadata stream ended without terminator");
                break;
            }
        };
        let truncated = ProtocolError::TruncatedMetadata { key: token };
        let value = match token {
            0..=layout::METADATA_TEXT_MAX => {
                let bytes = reader.read_until_nul()?.ok_or(truncated)?;
                MetadataValue::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
            0x20..=layout::METADATA_U32_MAX => {
                MetadataValue::U32(reader.read_u32_be()?.ok_or(truncated)?)
            }
            0x40..=layout::METADATA_U8_MAX => {
                MetadataValue::U8(reader.read_u8()?.ok_or(truncated)?)
            }
            _ => match policy {
                TokenPolicy::Lenient => MetadataValue::Flag,
                TokenPolicy::Strict => return Err(ProtocolError::UnknownMetadataKey { key: token }),
            },
        };
        log::debug!("metadata 0x{:02x} = {}", token, value);
        metadata.push(token, value);
    }

    Ok(metadata)
}
