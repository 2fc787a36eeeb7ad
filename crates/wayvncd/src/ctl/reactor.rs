//! Readiness notification port.
//!
//! The control server never owns an event loop. It registers descriptors
//! with a [`Reactor`] and is handed [`ReadyEvent`]s back, which keeps the
//! protocol logic testable with a recording fake. [`PollReactor`] is the
//! production implementation on top of `poll(2)`.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use tracing::trace;

use super::CTL_TARGET;

/// Identifier allocated to every accepted control client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Wraps a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctl-client-{}", self.0)
    }
}

/// Registration key for a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Token {
    /// The listening socket.
    Listener,
    /// An accepted client socket.
    Client(ClientId),
}

/// Readiness a registration is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest {
    /// Wake when the descriptor can be read.
    pub readable: bool,
    /// Wake when the descriptor can be written.
    pub writable: bool,
}

impl Interest {
    /// Read readiness only.
    pub const READABLE: Self = Self {
        readable: true,
        writable: false,
    };
    /// Write readiness only.
    pub const WRITABLE: Self = Self {
        readable: false,
        writable: true,
    };
    /// Both read and write readiness.
    pub const BOTH: Self = Self {
        readable: true,
        writable: true,
    };
}

/// A readiness notification for one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyEvent {
    /// Registration the event belongs to.
    pub token: Token,
    /// The descriptor can be read, or has hung up.
    pub readable: bool,
    /// The descriptor can be written.
    pub writable: bool,
}

/// Event registration capability the control server depends on.
pub trait Reactor {
    /// Starts watching `fd` under `token`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reactor cannot watch the descriptor.
    fn register(&mut self, token: Token, fd: RawFd, interest: Interest) -> io::Result<()>;

    /// Replaces the interest of an existing registration.
    ///
    /// # Errors
    ///
    /// Returns an error when the token is not registered.
    fn reregister(&mut self, token: Token, interest: Interest) -> io::Result<()>;

    /// Stops watching the descriptor registered under `token`.
    fn deregister(&mut self, token: Token);

    /// Waits up to `timeout` for readiness and returns what became ready.
    ///
    /// # Errors
    ///
    /// Returns the underlying wait error.
    fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<ReadyEvent>>;
}

#[derive(Debug, Clone, Copy)]
struct Source {
    fd: RawFd,
    interest: Interest,
}

/// Level-triggered reactor backed by `poll(2)`.
#[derive(Debug, Default)]
pub struct PollReactor {
    sources: BTreeMap<Token, Source>,
}

impl PollReactor {
    /// Creates a reactor with no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Reactor for PollReactor {
    fn register(&mut self, token: Token, fd: RawFd, interest: Interest) -> io::Result<()> {
        if self.sources.contains_key(&token) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{token:?} is already registered"),
            ));
        }
        self.sources.insert(token, Source { fd, interest });
        Ok(())
    }

    fn reregister(&mut self, token: Token, interest: Interest) -> io::Result<()> {
        let source = self.sources.get_mut(&token).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{token:?} is not registered"))
        })?;
        source.interest = interest;
        Ok(())
    }

    fn deregister(&mut self, token: Token) {
        self.sources.remove(&token);
    }

    fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<ReadyEvent>> {
        let (tokens, mut fds): (Vec<Token>, Vec<libc::pollfd>) = self
            .sources
            .iter()
            .map(|(token, source)| (*token, pollfd(source)))
            .unzip();
        let count = libc::nfds_t::try_from(fds.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many descriptors"))?;
        let timeout_ms = timeout.map_or(-1, |timeout| {
            i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX)
        });

        // SAFETY: `fds` is a live, exclusively borrowed buffer of `count`
        // initialised `pollfd` entries for the duration of the call.
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), count, timeout_ms) };
        if ready < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::Interrupted {
                trace!(target: CTL_TARGET, "poll interrupted");
                return Ok(Vec::new());
            }
            return Err(error);
        }

        let events = tokens
            .into_iter()
            .zip(fds)
            .filter(|(_, fd)| fd.revents != 0)
            .map(|(token, fd)| ReadyEvent {
                token,
                readable: fd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0,
                writable: fd.revents & libc::POLLOUT != 0,
            })
            .collect();
        Ok(events)
    }
}

fn pollfd(source: &Source) -> libc::pollfd {
    let mut events = 0;
    if source.interest.readable {
        events |= libc::POLLIN;
    }
    if source.interest.writable {
        events |= libc::POLLOUT;
    }
    libc::pollfd {
        fd: source.fd,
        events,
        revents: 0,
    }
}
