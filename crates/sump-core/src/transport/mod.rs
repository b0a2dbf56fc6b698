//! Byte transports the codec talks through.
//!
//! The codec only needs blocking writes, length-bounded reads that come back
//! short at end of stream, and a read timeout it can change. `MemoryTransport`
//! serves tests and replays; `SerialTransport` (feature `serial`) drives a
//! real device.

mod memory;
#[cfg(feature = "serial")]
mod serial;

pub use memory::MemoryTransport;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;

use std::io;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// Half-duplex byte channel to a SUMP device.
pub trait Transport {
    /// Write every byte of `bytes`.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read up to `len` bytes, blocking until they arrive or the timeout
    /// expires. A shorter result means the stream ended.
    fn read(&mut self, len: usize) -> io::Result<Vec<u8>>;

    fn timeout(&self) -> Duration;

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read(&mut self, len: usize) -> io::Result<Vec<u8>> {
        (**self).read(len)
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_timeout(timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read(&mut self, len: usize) -> io::Result<Vec<u8>> {
        (**self).read(len)
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_timeout(timeout)
    }
}

/// Overrides a transport's read timeout until dropped.
///
/// The previous timeout is put back on every exit path, including early
/// returns and errors raised while the guard is alive.
///
/// # Examples
/// ```
/// use std::time::Duration;
///
/// use sump_core::transport::{MemoryTransport, TimeoutGuard, Transport};
///
/// let mut transport = MemoryTransport::new();
/// transport.set_timeout(Duration::from_secs(30)).unwrap();
/// {
///     let guard = TimeoutGuard::new(&mut transport, Duration::from_secs(2)).unwrap();
///     assert_eq!(guard.timeout(), Duration::from_secs(2));
/// }
/// assert_eq!(transport.timeout(), Duration::from_secs(30));
/// ```
pub struct TimeoutGuard<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    previous: Duration,
}

impl<'a, T: Transport + ?Sized> TimeoutGuard<'a, T> {
    pub fn new(transport: &'a mut T, timeout: Duration) -> io::Result<Self> {
        let previous = transport.timeout();
        transport.set_timeout(timeout)?;
        Ok(Self {
            transport,
            previous,
        })
    }

    /// Timeout that will be restored on drop.
    pub fn previous(&self) -> Duration {
        self.previous
    }
}

impl<T: Transport + ?Sized> Deref for TimeoutGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.transport
    }
}

impl<T: Transport + ?Sized> DerefMut for TimeoutGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.transport
    }
}

impl<T: Transport + ?Sized> Drop for TimeoutGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.transport.set_timeout(self.previous) {
            log::warn!("failed to restore transport timeout {:?}: {}", self.previous, err);
        }
    }
}
