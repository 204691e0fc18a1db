use std::io::{ErrorKind, Write};

use crate::codec::{encode_length_prefix, FrameConfig};
use crate::error::{FrameError, Result};

/// Writes complete frames to any `Write` stream.
///
/// Each frame goes out as two sequential writes: the varint length prefix,
/// then the payload.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Encode and send a payload (blocking).
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.write_prefix(payload.len())?;
        self.write_payload(payload)
    }

    /// Write the length prefix for a payload of `len` bytes.
    ///
    /// Must be followed by [`write_payload`](Self::write_payload) with exactly
    /// `len` bytes; [`send`](Self::send) does both.
    pub fn write_prefix(&mut self, len: usize) -> Result<()> {
        if len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }

        let prefix = encode_length_prefix(len)?;
        self.write_all(&prefix)
    }

    /// Write payload bytes and flush.
    pub fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
        self.write_all(payload)?;
        self.flush()
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < buf.len() {
            match self.inner.write(&buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame encoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
