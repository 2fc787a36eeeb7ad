//! The wayvnc control socket.
//!
//! Local clients connect over a Unix stream socket and exchange back-to-back
//! JSON values. Each request names a `method` from a small fixed catalog and
//! receives exactly one response echoing its `id`. Clients that send
//! `event-receive` additionally receive unsolicited events.
//!
//! The server is single threaded and never blocks: every socket is
//! non-blocking and readiness arrives through an injected [`Reactor`].

mod actions;
mod command;
mod connection;
mod dispatch;
mod errors;
mod framing;
mod reactor;
mod registry;
mod request;
mod response;
mod server;
mod socket;
#[cfg(test)]
pub(crate) mod test_utils;

pub use self::actions::{OutputActions, VersionInfo};
pub use self::command::{Command, CycleDirection, HelpTopic, OutputTarget};
pub use self::connection::{ClientConnection, ReadOutcome, WriteOutcome};
pub use self::dispatch::Dispatcher;
pub use self::errors::{ConnectionError, FramingError, RequestError, ServerError};
pub use self::framing::ReadBuffer;
pub use self::reactor::{ClientId, Interest, PollReactor, Reactor, ReadyEvent, Token};
pub use self::registry::{
    CommandKind, Descriptor, EventKind, ParamInfo, command_names, event_names,
};
pub use self::request::{RejectedRequest, Request};
pub use self::response::{ClientEventParams, CommandResponse, ServerEvent, code, encode};
pub use self::server::{ControlServer, DEFAULT_READ_BUFFER_CAPACITY, ServerOptions};
pub use self::socket::max_socket_path_len;

pub(crate) const CTL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::ctl");
