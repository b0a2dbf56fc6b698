//! Sample stream decoding.
//!
//! Each sample arrives as one byte per enabled lane, lowest lane first. A
//! lane's byte lands at bit `8 * lane` of the sample word, so disabling a
//! lane leaves a zero byte in its place rather than shifting the others.

use super::error::ProtocolError;
use super::reader::StreamReader;
use crate::capture::{Capture, CaptureOrder};
use crate::settings::Settings;
use crate::transport::Transport;

/// Read `count` samples made of the given lanes.
///
/// With no lanes enabled nothing is read and every sample is zero.
///
/// # Examples
/// ```
/// use sump_core::protocol::decode_samples;
/// use sump_core::transport::MemoryTransport;
///
/// let mut transport = MemoryTransport::with_input(&[0x01, 0x02, 0x03, 0x04]);
/// let samples = decode_samples(&mut transport, &[0, 1, 2, 3], 1).unwrap();
/// assert_eq!(samples, vec![0x0403_0201]);
/// ```
pub fn decode_samples<T: Transport + ?Sized>(
    transport: &mut T,
    lanes: &[u8],
    count: usize,
) -> Result<Vec<u32>, ProtocolError> {
    let mut reader = StreamReader::new(transport);
    let mut samples = Vec::with_capacity(count);
    for sample in 0..count {
        let mut word = 0u32;
        for &lane in lanes {
            let byte = reader
                .read_u8()?
                .ok_or(ProtocolError::TruncatedCapture {
                    sample,
                    lane,
                    expected_samples: count,
                })?;
            word |= u32::from(byte) << (8 * u32::from(lane));
        }
        samples.push(word);
    }
    log::debug!(
        "decoded {} samples from {} bytes",
        samples.len(),
        reader.consumed()
    );
    Ok(samples)
}

/// Read the capture described by `settings`.
///
/// The device returns the read count rounded down to a multiple of 4, so
/// that many samples are read. Samples stay in arrival order; `order` records
/// how the device sent them.
pub fn decode_capture<T: Transport + ?Sized>(
    transport: &mut T,
    settings: &Settings,
    order: CaptureOrder,
) -> Result<Capture, ProtocolError> {
    settings.validate()?;
    let lanes = settings.enabled_lanes();
    let count = settings.normalized_read_count() as usize;
    let samples = decode_samples(transport, &lanes, count)?;
    log::info!("captured {} samples ({} lanes)", samples.len(), lanes.len());
    Ok(Capture::new(samples, lanes.len() as u8, order))
}
