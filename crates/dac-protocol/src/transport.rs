//! # Transport Contract
//!
//! The core never opens sockets. A session runs over anything that can move
//! bytes in both directions: a TCP stream, a CAN segmenter, an in-memory
//! pipe. Every `std::io::Read + Write` type is a [`Transport`].
//!
//! Short reads and writes are retried until the requested count is reached;
//! `Ok(0)` means the peer closed the pipe and is fatal to the session.

use crate::error::TransportError;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Byte pipe a session runs over
pub trait Transport {
    /// Read up to `buf.len()` bytes, returning how many were read (0 = closed)
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write up to `buf.len()` bytes, returning how many were written
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Flush buffered output
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Fill `buf` completely
    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let mut offset = 0;
        while offset < buf.len() {
            match Transport::read(self, &mut buf[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::from_io(e)),
            }
        }
        Ok(())
    }

    /// Write all of `buf`
    fn send_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let mut offset = 0;
        while offset < buf.len() {
            match Transport::write(self, &buf[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::from_io(e)),
            }
        }
        Transport::flush(self).map_err(TransportError::from_io)
    }
}

impl<S: Read + Write> Transport for S {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TIMEOUTS
// ═══════════════════════════════════════════════════════════════════════════

/// Read/write time-outs for a blocking transport
///
/// `None` blocks forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timeouts {
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

impl Timeouts {
    /// Build from seconds, where 0 means no time-out
    pub fn from_secs(read: u64, write: u64) -> Self {
        let to_opt = |s: u64| if s == 0 { None } else { Some(Duration::from_secs(s)) };
        Self {
            read: to_opt(read),
            write: to_opt(write),
        }
    }

    /// Apply to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_read_timeout(self.read)?;
        stream.set_write_timeout(self.write)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CANCELLATION
// ═══════════════════════════════════════════════════════════════════════════

/// Shared cancellation flag
///
/// Checked by the session before every handshake stage and every frame.
/// A blocked read is not interrupted; pair this with read time-outs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
