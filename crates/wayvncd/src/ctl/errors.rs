//! Error types for the control socket.
//!
//! Failures fall into three tiers. [`RequestError`] describes a bad request
//! and is answered with a normal failure response. [`ConnectionError`] ends a
//! single client connection, optionally after a farewell diagnostic.
//! [`ServerError`] prevents the control socket from starting at all.

use std::io;

use camino::Utf8PathBuf;
use serde_json::{Map, Value};
use thiserror::Error;

use super::response::{CommandResponse, code};

/// A request-level failure reported back to the client as a response.
///
/// This is a small structured-error builder: a result code, a human readable
/// message, and optional extra fields merged into the response payload.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct RequestError {
    code: i32,
    message: String,
    fields: Map<String, Value>,
}

impl RequestError {
    /// Creates an error with an explicit result code.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Creates a validation error (`EINVAL`).
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(code::INVALID_ARGUMENT, message)
    }

    /// Creates a lookup failure (`ENOENT`).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(code::NOT_FOUND, message)
    }

    /// Attaches an additional structured field to the error payload.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_owned(), value.into());
        self
    }

    /// Result code carried by the error.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Human readable description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Additional payload fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<RequestError> for CommandResponse {
    fn from(error: RequestError) -> Self {
        let mut data = Map::new();
        data.insert("error".to_owned(), Value::String(error.message));
        for (name, value) in error.fields {
            data.entry(name).or_insert(value);
        }
        Self::new(error.code, Some(data))
    }
}

/// Errors raised while extracting JSON values from the inbound buffer.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The buffer is full and still holds no complete value.
    #[error("Buffer overflow")]
    Overflow {
        /// Capacity of the inbound buffer in bytes.
        capacity: usize,
    },
    /// The byte stream is not valid JSON.
    #[error("{0}")]
    Malformed(#[source] serde_json::Error),
}

/// Failures that end a single control client connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Inbound data could not be framed.
    #[error(transparent)]
    Framing(#[from] FramingError),
    /// The client stopped draining its outbound queue.
    #[error("Outbound queue overflow ({limit} messages pending)")]
    QueueFull {
        /// Configured per-client queue limit.
        limit: usize,
    },
    /// The peer closed its end of the socket.
    #[error("peer closed the connection")]
    PeerClosed,
    /// Reading from or writing to the socket failed.
    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl ConnectionError {
    /// Farewell diagnostic delivered before the connection closes.
    ///
    /// Returns `None` when the socket itself is unusable and the connection
    /// must be dropped without a message.
    pub fn diagnostic(&self) -> Option<CommandResponse> {
        match self {
            Self::Framing(FramingError::Overflow { .. }) | Self::QueueFull { .. } => Some(
                CommandResponse::from(RequestError::new(code::IO_ERROR, self.to_string())),
            ),
            Self::Framing(FramingError::Malformed(_)) => Some(CommandResponse::from(
                RequestError::invalid(self.to_string()),
            )),
            Self::PeerClosed | Self::Io(_) => None,
        }
    }
}

/// Errors surfaced while starting the control socket server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The socket path does not fit in a Unix socket address.
    #[error("control socket path {path} is too long ({len} bytes, limit {max})")]
    NameTooLong {
        /// Requested socket path.
        path: Utf8PathBuf,
        /// Length of the path in bytes.
        len: usize,
        /// Longest path the platform accepts.
        max: usize,
    },
    /// Another process is already serving the socket.
    #[error("control socket {path} is already in use")]
    InUse {
        /// Requested socket path.
        path: Utf8PathBuf,
    },
    /// Something other than a socket occupies the path.
    #[error("control socket path {path} is not a socket")]
    NotSocket {
        /// Requested socket path.
        path: Utf8PathBuf,
    },
    /// Metadata for an existing node could not be read.
    #[error("failed to read metadata for control socket {path}: {source}")]
    Metadata {
        /// Requested socket path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Probing an existing socket failed unexpectedly.
    #[error("failed to probe existing control socket {path}: {source}")]
    Connect {
        /// Requested socket path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A stale socket node could not be removed.
    #[error("failed to remove stale control socket {path}: {source}")]
    Cleanup {
        /// Requested socket path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Binding or listening on the socket failed.
    #[error("failed to bind control socket {path}: {source}")]
    Bind {
        /// Requested socket path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The listening socket could not be made non-blocking.
    #[error("failed to make control socket non-blocking: {source}")]
    NonBlocking {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The reactor refused the listening socket.
    #[error("failed to register control socket for events: {source}")]
    Register {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
