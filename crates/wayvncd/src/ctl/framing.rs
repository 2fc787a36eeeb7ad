//! Incremental JSON framing over a byte stream.
//!
//! Clients send back-to-back JSON values with no delimiter. A single read may
//! deliver a fragment of a value, exactly one value, or several values; the
//! [`ReadBuffer`] accumulates bytes and hands back one complete value at a
//! time, keeping any trailing partial value for the next read.

use std::io::{self, Read};

use serde_json::{Deserializer, Value};
use tracing::{debug, trace};

use super::CTL_TARGET;
use super::errors::FramingError;

/// Fixed-capacity inbound buffer for one client.
#[derive(Debug)]
pub struct ReadBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl ReadBuffer {
    /// Creates an empty buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0_u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Maximum number of buffered bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the buffer has no room left.
    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Performs a single read into the free space of the buffer.
    ///
    /// A return of `Ok(0)` means the reader reached end of stream.
    ///
    /// # Errors
    ///
    /// Propagates the reader's error, including `WouldBlock`.
    pub fn fill_from<R: Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        let free = &mut self.data[self.len..];
        let read = reader.read(free)?;
        self.len += read;
        trace!(target: CTL_TARGET, read, buffered = self.len, "read into buffer");
        Ok(read)
    }

    /// Appends bytes to the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::Overflow`] without modifying the buffer when
    /// `bytes` does not fit.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), FramingError> {
        let end = self.len + bytes.len();
        let Some(free) = self.data.get_mut(self.len..end) else {
            return Err(FramingError::Overflow {
                capacity: self.capacity(),
            });
        };
        free.copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    /// Extracts the next complete JSON value, if one is buffered.
    ///
    /// On success the consumed bytes are discarded and any remaining bytes
    /// move to the front of the buffer. `Ok(None)` means more bytes are needed
    /// (or only whitespace remains, which is discarded). A top-level number is
    /// only returned once a delimiter follows it.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::Malformed`] when the buffered bytes can never
    /// form valid JSON.
    pub fn next_value(&mut self) -> Result<Option<Value>, FramingError> {
        let buffered = &self.data[..self.len];
        let mut values = Deserializer::from_slice(buffered).into_iter::<Value>();
        match values.next() {
            None => {
                self.len = 0;
                Ok(None)
            }
            Some(Ok(value)) => {
                let consumed = values.byte_offset();
                // A number running to the end of the buffer may still grow.
                if value.is_number() && consumed == self.len {
                    trace!(target: CTL_TARGET, buffered = self.len, "awaiting number delimiter");
                    return Ok(None);
                }
                debug!(
                    target: CTL_TARGET,
                    "<< {}",
                    String::from_utf8_lossy(&buffered[..consumed])
                );
                self.consume(consumed);
                Ok(Some(value))
            }
            Some(Err(error)) if error.is_eof() => {
                trace!(target: CTL_TARGET, buffered = self.len, "awaiting more data");
                Ok(None)
            }
            Some(Err(error)) => Err(FramingError::Malformed(error)),
        }
    }

    fn consume(&mut self, count: usize) {
        self.data.copy_within(count..self.len, 0);
        self.len -= count;
    }
}
