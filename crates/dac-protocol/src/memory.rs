//! # In-Memory Transport
//!
//! Duplex byte pipe between two endpoints in the same process. Each write
//! becomes one chunk on the peer's queue; reads drain chunks in order.
//! Dropping one end makes the other end read EOF.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// One end of an in-memory duplex pipe
#[derive(Debug)]
pub struct MemoryPipe {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
    read_timeout: Option<Duration>,
}

/// Create a connected pair of pipe ends
pub fn duplex() -> (MemoryPipe, MemoryPipe) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (MemoryPipe::new(a_tx, a_rx), MemoryPipe::new(b_tx, b_rx))
}

impl MemoryPipe {
    fn new(tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>) -> Self {
        Self {
            tx,
            rx,
            pending: Vec::new(),
            pos: 0,
            read_timeout: None,
        }
    }

    /// Set the read time-out (`None` blocks forever)
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Builder-style variant of [`MemoryPipe::set_read_timeout`]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    fn refill(&mut self) -> io::Result<bool> {
        let chunk = match self.read_timeout {
            Some(t) => match self.rx.recv_timeout(t) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "pipe read timed out"))
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(false),
            },
            None => match self.rx.recv() {
                Ok(chunk) => chunk,
                Err(_) => return Ok(false),
            },
        };
        self.pending = chunk;
        self.pos = 0;
        Ok(true)
    }
}

impl Read for MemoryPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.pending.len() {
            if !self.refill()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for MemoryPipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe peer dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
