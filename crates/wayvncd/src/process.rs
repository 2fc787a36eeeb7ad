//! Process supervision for the daemon binary.
//!
//! [`run_daemon`] wires configuration, logging, and the control socket
//! together and services the socket until a termination signal arrives or a
//! client sends `wayvnc-exit`.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use thiserror::Error;
use tracing::{info, warn};

use wayvnc_config::{Config, SocketPathSource, SocketPreparationError, prepare_socket_directory};

use crate::ctl::{
    ControlServer, DEFAULT_READ_BUFFER_CAPACITY, PollReactor, Reactor, ServerError, ServerOptions,
    VersionInfo,
};
use crate::outputs::StaticOutputs;
use crate::telemetry::{self, TelemetryError};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// How long one reactor wait may block before signal flags are rechecked.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Attempts made to flush queued output before exiting on request.
const FINAL_FLUSH_ATTEMPTS: usize = 32;

/// Errors that stop the daemon from starting or running.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Logging could not be configured.
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    /// The socket directory could not be prepared.
    #[error("failed to prepare control socket: {source}")]
    Socket {
        /// Underlying filesystem error.
        #[source]
        source: SocketPreparationError,
    },
    /// The control socket could not be started.
    #[error(transparent)]
    Server(#[from] ServerError),
    /// Installing the termination signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Waiting for socket readiness failed.
    #[error("control socket event loop failed: {source}")]
    Poll {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Runs the daemon until it is asked to stop.
///
/// # Errors
///
/// Returns [`LaunchError`] when startup fails or the event loop breaks.
pub fn run_daemon(config: &Config) -> Result<(), LaunchError> {
    telemetry::initialise(config)?;

    let resolved = config.resolve_socket_path();
    if resolved.source == SocketPathSource::TempFallback {
        warn!(
            target: PROCESS_TARGET,
            path = %resolved.path,
            "XDG_RUNTIME_DIR is not set, falling back to a temporary socket path"
        );
    }
    prepare_socket_directory(&resolved.path).map_err(|source| LaunchError::Socket { source })?;

    let options = ServerOptions {
        read_buffer_capacity: DEFAULT_READ_BUFFER_CAPACITY,
        max_queued_messages: config.max_queued_messages,
        versions: VersionInfo::with_engines(
            config.neatvnc_version.as_str(),
            config.aml_version.as_str(),
        ),
    };
    let outputs = StaticOutputs::new(config.outputs.iter().cloned());
    let mut server = ControlServer::bind(resolved.path, PollReactor::new(), outputs, options)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM, SIGHUP] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .map_err(|source| LaunchError::Signals { source })?;
    }

    info!(
        target: PROCESS_TARGET,
        socket = %server.socket_path(),
        outputs = config.outputs.len(),
        "wayvncd ready"
    );
    let result = serve(&mut server, &shutdown);
    server.shutdown();
    info!(target: PROCESS_TARGET, "wayvncd stopped");
    result
}

/// Services the control socket until `shutdown` is raised or exit is requested.
pub(crate) fn serve<R: Reactor>(
    server: &mut ControlServer<R, StaticOutputs>,
    shutdown: &AtomicBool,
) -> Result<(), LaunchError> {
    while !shutdown.load(Ordering::SeqCst) {
        server
            .run_once(Some(POLL_INTERVAL))
            .map_err(|source| LaunchError::Poll { source })?;
        if let Some(output) = server.actions_mut().take_capture_change() {
            server.event_capture_changed(&output);
        }
        if server.actions().exit_requested() {
            info!(target: PROCESS_TARGET, "exiting at client request");
            flush_pending(server)?;
            return Ok(());
        }
    }
    info!(target: PROCESS_TARGET, "termination signal received");
    Ok(())
}

fn flush_pending<R: Reactor>(
    server: &mut ControlServer<R, StaticOutputs>,
) -> Result<(), LaunchError> {
    for _ in 0..FINAL_FLUSH_ATTEMPTS {
        if !server.has_pending_output() {
            break;
        }
        server
            .run_once(Some(Duration::ZERO))
            .map_err(|source| LaunchError::Poll { source })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    use camino::Utf8PathBuf;
    use serde_json::{Deserializer, Value, json};

    #[test]
    fn exit_request_flushes_replies_and_stops() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("wayvncctl")).expect("utf8 path");
        let mut server = ControlServer::bind(
            path.clone(),
            PollReactor::new(),
            StaticOutputs::new(["HDMI-A-1", "DP-1"]),
            ServerOptions::default(),
        )
        .expect("bind control server");

        let mut peer = UnixStream::connect(&path).expect("connect");
        peer.set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout");
        peer.write_all(
            br#"{"method":"event-receive","id":1}
{"method":"set-output","params":{"switch-to":"DP-1"},"id":2}
{"method":"wayvnc-exit","id":3}"#,
        )
        .expect("write requests");

        let shutdown = AtomicBool::new(false);
        serve(&mut server, &shutdown).expect("serve until exit");

        let messages: Vec<Value> = Deserializer::from_reader(&mut peer)
            .into_iter::<Value>()
            .take(4)
            .collect::<Result<_, _>>()
            .expect("read replies");
        assert_eq!(
            messages,
            [
                json!({"id": 1, "code": 0}),
                json!({"id": 2, "code": 0}),
                json!({"id": 3, "code": 0}),
                json!({"method": "capture-changed", "params": {"output": "DP-1"}}),
            ]
        );
        server.shutdown();
        assert!(!path.exists());
    }

    #[test]
    fn raised_shutdown_flag_stops_immediately() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("wayvncctl")).expect("utf8 path");
        let mut server = ControlServer::bind(
            path,
            PollReactor::new(),
            StaticOutputs::default(),
            ServerOptions::default(),
        )
        .expect("bind control server");
        let shutdown = AtomicBool::new(true);
        serve(&mut server, &shutdown).expect("serve");
        assert_eq!(server.client_count(), 0);
    }
}
