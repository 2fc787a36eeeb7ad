//! Control socket daemon for the wayvnc screen-sharing server.
//!
//! The daemon exposes a local Unix-domain control socket. Clients send JSON
//! requests to query versions, list the command catalog, switch the captured
//! output, or subscribe to asynchronous events about VNC clients coming and
//! going. The protocol state machine lives in [`ctl`]; it is single threaded,
//! never blocks, and is driven by an injected readiness [`ctl::Reactor`].
//!
//! [`run_daemon`] is the entry point used by the `wayvncd` binary. It
//! initialises structured logging, prepares and binds the socket, and services
//! it until a termination signal arrives or a client sends `wayvnc-exit`.

pub mod ctl;
mod outputs;
mod process;
mod telemetry;

pub use outputs::StaticOutputs;
pub use process::{LaunchError, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
