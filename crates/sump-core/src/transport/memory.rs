use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use super::Transport;

/// In-memory transport: serves queued input bytes and records writes.
///
/// Reads return fewer bytes than asked once the queue runs dry, the same
/// way a serial port behaves when the device stops sending.
///
/// # Examples
/// ```
/// use sump_core::transport::{MemoryTransport, Transport};
///
/// let mut transport = MemoryTransport::with_input(b"1ALS");
/// transport.write(&[0x02]).unwrap();
/// assert_eq!(transport.read(4).unwrap(), b"1ALS".to_vec());
/// assert_eq!(transport.written(), &[0x02]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryTransport {
    input: VecDeque<u8>,
    written: Vec<u8>,
    timeout: Duration,
    timeout_history: Vec<Duration>,
    fail_reads_after: Option<usize>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(bytes: &[u8]) -> Self {
        let mut transport = Self::new();
        transport.push_input(bytes);
        transport
    }

    /// Queue bytes for later reads.
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Make reads fail with an I/O error once `count` more bytes were served.
    pub fn fail_reads_after(&mut self, count: usize) {
        self.fail_reads_after = Some(count);
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }

    /// Input bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    /// Every timeout ever set, oldest first.
    pub fn timeout_history(&self) -> &[Duration] {
        &self.timeout_history
    }
}

impl Transport for MemoryTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }

    fn read(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut len = len.min(self.input.len());
        if let Some(budget) = self.fail_reads_after.as_mut() {
            if *budget == 0 && len > 0 {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "memory transport closed",
                ));
            }
            len = len.min(*budget);
            *budget -= len;
        }
        Ok(self.input.drain(..len).collect())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        self.timeout_history.push(timeout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::MemoryTransport;
    use crate::transport::Transport;

    #[test]
    fn short_read_at_end_of_input() {
        let mut transport = MemoryTransport::with_input(&[9, 8]);
        assert_eq!(transport.read(4).unwrap(), vec![9, 8]);
        assert!(transport.read(1).unwrap().is_empty());
    }

    #[test]
    fn injected_failure_after_budget() {
        let mut transport = MemoryTransport::with_input(&[1, 2, 3, 4]);
        transport.fail_reads_after(3);
        assert_eq!(transport.read(2).unwrap(), vec![1, 2]);
        assert_eq!(transport.read(2).unwrap(), vec![3]);
        let err = transport.read(1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn take_written_drains_the_log() {
        let mut transport = MemoryTransport::new();
        transport.write(&[0x11]).unwrap();
        transport.write(&[0x13]).unwrap();
        assert_eq!(transport.take_written(), vec![0x11, 0x13]);
        assert!(transport.written().is_empty());
    }
}
