//! Per-client connection state.
//!
//! A connection reads into a fixed [`ReadBuffer`], queues outbound messages
//! as JSON values, and serializes each one only when it reaches the head of
//! the queue. At most one message is in flight as a partially written byte
//! slice. A fatal error pushes a farewell to the front of the queue and flags
//! the connection as closing; it is torn down once that farewell drains.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::CTL_TARGET;
use super::errors::{ConnectionError, FramingError};
use super::framing::ReadBuffer;
use super::reactor::{ClientId, Interest};
use super::response::encode;

/// Result of servicing a readable notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes were appended to the inbound buffer.
    Received(usize),
    /// The socket had nothing to read after all.
    WouldBlock,
    /// The connection is closing and no longer reads.
    Ignored,
}

/// Result of servicing a writable notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing was queued.
    Idle,
    /// Bytes went out but more output remains.
    Progress,
    /// The socket refused the write.
    WouldBlock,
    /// Every queued message has been written.
    Drained,
    /// The closing message was written; the connection must be destroyed.
    Finished,
}

#[derive(Debug)]
struct Outbound {
    body: Value,
    close_after: bool,
}

#[derive(Debug)]
struct PartialWrite {
    bytes: Vec<u8>,
    offset: usize,
    close_after: bool,
}

/// State of one accepted control client.
#[derive(Debug)]
pub struct ClientConnection<S> {
    id: ClientId,
    stream: S,
    inbound: ReadBuffer,
    outbound: VecDeque<Outbound>,
    partial: Option<PartialWrite>,
    subscribed: bool,
    closing: bool,
    max_queued: usize,
    registered: Interest,
}

impl<S: Read + Write> ClientConnection<S> {
    /// Wraps an accepted stream.
    ///
    /// The connection starts out registered for reads only.
    pub fn new(id: ClientId, stream: S, read_capacity: usize, max_queued: usize) -> Self {
        Self {
            id,
            stream,
            inbound: ReadBuffer::new(read_capacity),
            outbound: VecDeque::new(),
            partial: None,
            subscribed: false,
            closing: false,
            max_queued,
            registered: Interest::READABLE,
        }
    }

    /// Identifier of the client.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Underlying stream.
    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Whether the client asked for events.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Mutable subscription flag handed to the dispatcher.
    pub fn subscription_mut(&mut self) -> &mut bool {
        &mut self.subscribed
    }

    /// Whether the connection is waiting for its farewell to drain.
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Number of messages waiting behind the in-flight write.
    pub fn queued_len(&self) -> usize {
        self.outbound.len()
    }

    /// Whether any output is queued or partially written.
    pub fn has_pending_output(&self) -> bool {
        self.partial.is_some() || !self.outbound.is_empty()
    }

    /// Interest the connection should be registered with right now.
    pub fn desired_interest(&self) -> Interest {
        Interest {
            readable: !self.closing,
            writable: self.has_pending_output(),
        }
    }

    /// Interest last pushed to the reactor.
    pub fn registered_interest(&self) -> Interest {
        self.registered
    }

    /// Records the interest pushed to the reactor.
    pub fn set_registered_interest(&mut self, interest: Interest) {
        self.registered = interest;
    }

    /// Performs one read into the inbound buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::PeerClosed`] on end of stream and
    /// [`ConnectionError::Io`] for any read failure other than would-block.
    pub fn read_ready(&mut self) -> Result<ReadOutcome, ConnectionError> {
        if self.closing {
            return Ok(ReadOutcome::Ignored);
        }
        if self.inbound.is_full() {
            return Err(FramingError::Overflow {
                capacity: self.inbound.capacity(),
            }
            .into());
        }
        match self.inbound.fill_from(&mut self.stream) {
            Ok(0) => Err(ConnectionError::PeerClosed),
            Ok(read) => Ok(ReadOutcome::Received(read)),
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                trace!(target: CTL_TARGET, client = %self.id, "read would block");
                Ok(ReadOutcome::WouldBlock)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Extracts the next complete value from the inbound buffer.
    ///
    /// # Errors
    ///
    /// Returns a framing error when the data is malformed, or when the buffer
    /// is full without holding a complete value.
    pub fn next_value(&mut self) -> Result<Option<Value>, ConnectionError> {
        if self.closing {
            return Ok(None);
        }
        match self.inbound.next_value()? {
            Some(value) => Ok(Some(value)),
            None if self.inbound.is_full() => Err(FramingError::Overflow {
                capacity: self.inbound.capacity(),
            }
            .into()),
            None => Ok(None),
        }
    }

    /// Appends a message to the back of the queue.
    ///
    /// Messages offered while closing are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::QueueFull`] when the queue is at its limit.
    pub fn enqueue(&mut self, body: Value) -> Result<(), ConnectionError> {
        if self.closing {
            trace!(target: CTL_TARGET, client = %self.id, "dropping message for closing client");
            return Ok(());
        }
        if self.outbound.len() >= self.max_queued {
            return Err(ConnectionError::QueueFull {
                limit: self.max_queued,
            });
        }
        self.outbound.push_back(Outbound {
            body,
            close_after: false,
        });
        trace!(
            target: CTL_TARGET,
            client = %self.id,
            queued = self.outbound.len(),
            "queued message"
        );
        Ok(())
    }

    /// Queues a final message ahead of everything else and starts closing.
    ///
    /// Messages still waiting in the queue are discarded since the connection
    /// ends once the farewell is written. A partially written message is
    /// completed first so the stream stays well formed.
    pub fn enqueue_farewell(&mut self, body: Value) {
        let discarded = self.outbound.len();
        self.outbound.clear();
        self.outbound.push_front(Outbound {
            body,
            close_after: true,
        });
        self.closing = true;
        debug!(
            target: CTL_TARGET,
            client = %self.id,
            discarded,
            "queued farewell message"
        );
    }

    /// Performs one write of pending output.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Io`] when the socket write fails for any
    /// reason other than would-block.
    pub fn write_ready(&mut self) -> Result<WriteOutcome, ConnectionError> {
        let Some(mut partial) = self.partial.take().or_else(|| self.dequeue()) else {
            return Ok(if self.closing {
                WriteOutcome::Finished
            } else {
                WriteOutcome::Idle
            });
        };
        let pending = &partial.bytes[partial.offset..];
        match self.stream.write(pending) {
            Ok(0) => Err(io::Error::from(io::ErrorKind::WriteZero).into()),
            Ok(written) => {
                partial.offset += written;
                if partial.offset < partial.bytes.len() {
                    trace!(
                        target: CTL_TARGET,
                        client = %self.id,
                        written,
                        remaining = partial.bytes.len() - partial.offset,
                        "partial write"
                    );
                    self.partial = Some(partial);
                    return Ok(WriteOutcome::Progress);
                }
                if partial.close_after {
                    return Ok(WriteOutcome::Finished);
                }
                Ok(if self.has_pending_output() {
                    WriteOutcome::Progress
                } else {
                    WriteOutcome::Drained
                })
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                trace!(target: CTL_TARGET, client = %self.id, "write would block");
                self.partial = Some(partial);
                Ok(WriteOutcome::WouldBlock)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn dequeue(&mut self) -> Option<PartialWrite> {
        while let Some(message) = self.outbound.pop_front() {
            match encode(&message.body) {
                Ok(bytes) => {
                    debug!(
                        target: CTL_TARGET,
                        client = %self.id,
                        ">> {}",
                        String::from_utf8_lossy(&bytes)
                    );
                    return Some(PartialWrite {
                        bytes,
                        offset: 0,
                        close_after: message.close_after,
                    });
                }
                Err(error) => {
                    warn!(
                        target: CTL_TARGET,
                        client = %self.id,
                        %error,
                        "dropping message that failed to encode"
                    );
                }
            }
        }
        None
    }
}
