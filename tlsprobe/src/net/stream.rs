//! Byte channels the record transport runs over.
//!
//! A [`crate::net::Connection`] is the real thing. [`MemoryStream`] has two
//! in-memory channels: reads take data from the inbound channel and every
//! write is kept separately in the outbound channel, so tests can observe how
//! a transmission was split.

use std::{
    io,
    io::{ErrorKind, Read, Write},
    time::Duration,
};

pub trait Stream: Read + Write {
    /// Bounds the next blocking read.
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

/// Describes the inbound channel of a [`MemoryStream`].
pub type Channel = io::Cursor<Vec<u8>>;

pub struct MemoryStream {
    inbound: Channel,
    outbound: Vec<Vec<u8>>,
    /// Whether an exhausted inbound channel reads as EOF instead of a timeout.
    closed: bool,
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStream {
    pub fn new() -> Self {
        Self {
            inbound: io::Cursor::new(Vec::new()),
            outbound: Vec::new(),
            closed: false,
        }
    }

    pub fn add_to_inbound(&mut self, bytes: &[u8]) {
        self.inbound.get_mut().extend_from_slice(bytes);
    }

    /// Makes reads past the inbound data return EOF.
    pub fn close_inbound(&mut self) {
        self.closed = true;
    }

    /// Every write call, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.outbound
    }

    pub fn written(&self) -> Vec<u8> {
        self.outbound.concat()
    }
}

impl Stream for MemoryStream {
    fn set_read_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inbound.read(buf)?;
        if n == 0 && !buf.is_empty() && !self.closed {
            return Err(io::Error::new(ErrorKind::WouldBlock, "no more inbound data"));
        }
        Ok(n)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
