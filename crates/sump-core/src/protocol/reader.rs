use std::io;

use super::error::ProtocolError;
use crate::transport::Transport;

/// Byte-at-a-time reads from a transport with end-of-stream detection.
///
/// Every method returns `Ok(None)` when the transport delivered fewer bytes
/// than requested; callers decide whether that ends the stream or is fatal.
pub struct StreamReader<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    consumed: usize,
}

impl<'a, T: Transport + ?Sized> StreamReader<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self {
            transport,
            consumed: 0,
        }
    }

    pub fn read_u8(&mut self) -> io::Result<Option<u8>> {
        let bytes = self.transport.read(1)?;
        self.consumed += bytes.len();
        Ok(bytes.first().copied())
    }

    pub fn read_array<const N: usize>(&mut self) -> io::Result<Option<[u8; N]>> {
        let bytes = self.transport.read(N)?;
        self.consumed += bytes.len();
        Ok(bytes.try_into().ok())
    }

    pub fn read_u32_be(&mut self) -> io::Result<Option<u32>> {
        Ok(self.read_array::<4>()?.map(u32::from_be_bytes))
    }

    /// Bytes up to, not including, the next NUL.
    pub fn read_until_nul(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut out = Vec::new();
        loop {
            match self.read_u8()? {
                Some(0) => return Ok(Some(out)),
                Some(byte) => out.push(byte),
                None => return Ok(None),
            }
        }
    }

    /// Total bytes taken from the transport so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

/// Bounds-checked little-endian reads from an encoded command buffer.
pub struct CommandReader<'a> {
    bytes: &'a [u8],
}

impl<'a> CommandReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.bytes.len() < needed {
            return Err(ProtocolError::TruncatedCommand {
                needed,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, ProtocolError> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or(ProtocolError::TruncatedCommand {
                needed: offset + 1,
                actual: self.bytes.len(),
            })
    }

    pub fn read_u16_le(&self, offset: usize) -> Result<u16, ProtocolError> {
        let bytes = self.read_slice(offset..offset + 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_le(&self, offset: usize) -> Result<u32, ProtocolError> {
        let bytes = self.read_slice(offset..offset + 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], ProtocolError> {
        self.bytes
            .get(range.clone())
            .ok_or(ProtocolError::TruncatedCommand {
                needed: range.end,
                actual: self.bytes.len(),
            })
    }
}
