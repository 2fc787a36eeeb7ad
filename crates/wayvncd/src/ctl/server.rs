//! Control socket server.
//!
//! The server owns the listening socket, every live [`ClientConnection`], and
//! the [`Dispatcher`]. It is driven entirely by [`ReadyEvent`]s from the
//! injected [`Reactor`]: nothing here blocks, and all state is touched from the
//! single thread that calls [`ControlServer::run_once`] or
//! [`ControlServer::handle_ready`].

use std::collections::HashMap;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use wayvnc_config::DEFAULT_MAX_QUEUED_MESSAGES;

use super::CTL_TARGET;
use super::actions::{OutputActions, VersionInfo};
use super::command::Command;
use super::connection::{ClientConnection, ReadOutcome, WriteOutcome};
use super::dispatch::Dispatcher;
use super::errors::{ConnectionError, ServerError};
use super::reactor::{ClientId, Interest, Reactor, ReadyEvent, Token};
use super::request::Request;
use super::response::{ClientEventParams, CommandResponse, ServerEvent, pretty};
use super::socket::{bind_unix, remove_socket};

/// Default capacity of each client's inbound buffer in bytes.
pub const DEFAULT_READ_BUFFER_CAPACITY: usize = 512;

/// Tunables for a [`ControlServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Capacity of each client's inbound buffer in bytes.
    pub read_buffer_capacity: usize,
    /// Messages a client may have queued before it is disconnected.
    pub max_queued_messages: usize,
    /// Versions reported by the `version` command.
    pub versions: VersionInfo,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            read_buffer_capacity: DEFAULT_READ_BUFFER_CAPACITY,
            max_queued_messages: DEFAULT_MAX_QUEUED_MESSAGES,
            versions: VersionInfo::default(),
        }
    }
}

/// The control socket server.
pub struct ControlServer<R, A> {
    path: Utf8PathBuf,
    listener: Option<UnixListener>,
    reactor: R,
    dispatcher: Dispatcher<A>,
    clients: HashMap<ClientId, ClientConnection<UnixStream>>,
    next_client: u64,
    read_buffer_capacity: usize,
    max_queued_messages: usize,
}

impl<R: Reactor, A: OutputActions> ControlServer<R, A> {
    /// Binds the control socket at `path` and registers it with `reactor`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the path is unusable, the bind fails, or
    /// the reactor refuses the listening socket. The socket node is removed
    /// again on failure.
    pub fn bind(
        path: impl Into<Utf8PathBuf>,
        mut reactor: R,
        actions: A,
        options: ServerOptions,
    ) -> Result<Self, ServerError> {
        let path = path.into();
        let listener = bind_unix(&path)?;
        if let Err(source) = listener.set_nonblocking(true) {
            remove_socket(&path);
            return Err(ServerError::NonBlocking { source });
        }
        if let Err(source) =
            reactor.register(Token::Listener, listener.as_raw_fd(), Interest::READABLE)
        {
            remove_socket(&path);
            return Err(ServerError::Register { source });
        }
        info!(target: CTL_TARGET, path = %path, "control socket listening");
        Ok(Self {
            path,
            listener: Some(listener),
            reactor,
            dispatcher: Dispatcher::new(actions, options.versions),
            clients: HashMap::new(),
            next_client: 1,
            read_buffer_capacity: options.read_buffer_capacity,
            max_queued_messages: options.max_queued_messages,
        })
    }

    /// Path of the bound socket node.
    pub fn socket_path(&self) -> &Utf8Path {
        &self.path
    }

    /// The injected reactor.
    pub fn reactor(&self) -> &R {
        &self.reactor
    }

    /// The output actions.
    pub fn actions(&self) -> &A {
        self.dispatcher.actions()
    }

    /// Exclusive access to the output actions.
    pub fn actions_mut(&mut self) -> &mut A {
        self.dispatcher.actions_mut()
    }

    /// Number of live control clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// State of one client, if it is still connected.
    pub fn client(&self, id: ClientId) -> Option<&ClientConnection<UnixStream>> {
        self.clients.get(&id)
    }

    /// Whether any client still has output waiting to be written.
    pub fn has_pending_output(&self) -> bool {
        self.clients.values().any(ClientConnection::has_pending_output)
    }

    /// Waits for readiness once and services every reported event.
    ///
    /// Returns the number of events handled.
    ///
    /// # Errors
    ///
    /// Propagates a failure of the reactor wait itself.
    pub fn run_once(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        let events = self.reactor.poll(timeout)?;
        let handled = events.len();
        for event in events {
            self.handle_ready(event);
        }
        Ok(handled)
    }

    /// Services a single readiness notification.
    pub fn handle_ready(&mut self, event: ReadyEvent) {
        match event.token {
            Token::Listener => {
                if event.readable {
                    self.accept_ready();
                }
            }
            Token::Client(id) => {
                let Some(client) = self.clients.get(&id) else {
                    trace!(target: CTL_TARGET, client = %id, "event for departed client");
                    return;
                };
                // A hang-up on a closing client surfaces as readable; let the
                // write path observe it.
                let writable = event.writable || (event.readable && client.is_closing());
                if writable && !self.flush_client(id) {
                    return;
                }
                if event.readable {
                    self.read_client(id);
                }
            }
        }
    }

    /// Queues `event` for every subscribed client.
    ///
    /// Returns the number of clients the event was queued for. A client whose
    /// queue is full is disconnected without affecting the others.
    pub fn broadcast(&mut self, event: &ServerEvent) -> usize {
        let envelope = match event.to_envelope() {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(
                    target: CTL_TARGET,
                    event = event.kind().name(),
                    %error,
                    "failed to encode event"
                );
                return 0;
            }
        };
        let subscribers: Vec<ClientId> = self
            .clients
            .values()
            .filter(|client| client.is_subscribed() && !client.is_closing())
            .map(ClientConnection::id)
            .collect();
        debug!(
            target: CTL_TARGET,
            event = event.kind().name(),
            subscribers = subscribers.len(),
            "broadcasting event"
        );
        let mut delivered = 0;
        for id in subscribers {
            if self.enqueue_to(id, envelope.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Announces a newly connected VNC client.
    pub fn event_client_connected(&mut self, params: ClientEventParams) -> usize {
        self.broadcast(&ServerEvent::ClientConnected(params))
    }

    /// Announces a departed VNC client.
    pub fn event_client_disconnected(&mut self, params: ClientEventParams) -> usize {
        self.broadcast(&ServerEvent::ClientDisconnected(params))
    }

    /// Announces that a different output is being captured.
    pub fn event_capture_changed(&mut self, output: &str) -> usize {
        self.broadcast(&ServerEvent::CaptureChanged {
            output: output.to_owned(),
        })
    }

    /// Queues a response produced outside the normal request cycle.
    ///
    /// This lets a command complete later without holding up the reactor.
    /// Returns `false` when the client is gone or could not take the message.
    pub fn enqueue_response(
        &mut self,
        client: ClientId,
        id: Option<Value>,
        response: CommandResponse,
    ) -> bool {
        if !self.clients.contains_key(&client) {
            debug!(target: CTL_TARGET, %client, "dropping response for departed client");
            return false;
        }
        self.enqueue_to(client, response.into_envelope(id))
    }

    /// Stops accepting, closes every client, and removes the socket node.
    pub fn shutdown(mut self) {
        for id in self.clients.keys().copied().collect::<Vec<_>>() {
            self.reactor.deregister(Token::Client(id));
        }
        if self.listener.is_some() {
            self.reactor.deregister(Token::Listener);
        }
        self.stop();
    }

    fn accept_ready(&mut self) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };
        let stream = match listener.accept() {
            Ok((stream, _)) => stream,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                trace!(target: CTL_TARGET, "no pending control connection");
                return;
            }
            Err(error) => {
                warn!(target: CTL_TARGET, %error, "failed to accept control client");
                return;
            }
        };
        if let Err(error) = stream.set_nonblocking(true) {
            warn!(target: CTL_TARGET, %error, "failed to make control client non-blocking");
            return;
        }
        let id = ClientId::new(self.next_client);
        self.next_client += 1;
        if let Err(error) =
            self.reactor
                .register(Token::Client(id), stream.as_raw_fd(), Interest::READABLE)
        {
            warn!(target: CTL_TARGET, client = %id, %error, "failed to watch control client");
            return;
        }
        self.clients.insert(
            id,
            ClientConnection::new(
                id,
                stream,
                self.read_buffer_capacity,
                self.max_queued_messages,
            ),
        );
        info!(
            target: CTL_TARGET,
            client = %id,
            clients = self.clients.len(),
            "control client connected"
        );
    }

    /// Returns `false` once the client has been destroyed.
    fn flush_client(&mut self, id: ClientId) -> bool {
        let Some(client) = self.clients.get_mut(&id) else {
            return false;
        };
        match client.write_ready() {
            Ok(WriteOutcome::Finished) => {
                info!(target: CTL_TARGET, client = %id, "closing control client after farewell");
                self.destroy_client(id);
                false
            }
            Ok(_) => {
                self.sync_interest(id);
                true
            }
            Err(error) => {
                error!(target: CTL_TARGET, client = %id, %error, "control client write failed");
                self.destroy_client(id);
                false
            }
        }
    }

    fn read_client(&mut self, id: ClientId) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        match client.read_ready() {
            Ok(ReadOutcome::Received(_)) => self.process_requests(id),
            Ok(ReadOutcome::WouldBlock | ReadOutcome::Ignored) => {}
            Err(error) => self.fail_client(id, error),
        }
        self.sync_interest(id);
    }

    fn process_requests(&mut self, id: ClientId) {
        loop {
            let Some(client) = self.clients.get_mut(&id) else {
                return;
            };
            let value = match client.next_value() {
                Ok(Some(value)) => value,
                Ok(None) => return,
                Err(error) => {
                    self.fail_client(id, error);
                    return;
                }
            };
            let envelope = respond(&mut self.dispatcher, client.subscription_mut(), value);
            if let Err(error) = client.enqueue(envelope) {
                self.fail_client(id, error);
                return;
            }
        }
    }

    fn enqueue_to(&mut self, id: ClientId, message: Value) -> bool {
        let Some(client) = self.clients.get_mut(&id) else {
            return false;
        };
        match client.enqueue(message) {
            Ok(()) => {
                self.sync_interest(id);
                true
            }
            Err(error) => {
                self.fail_client(id, error);
                false
            }
        }
    }

    fn fail_client(&mut self, id: ClientId, failure: ConnectionError) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        match failure.diagnostic() {
            Some(diagnostic) => {
                warn!(
                    target: CTL_TARGET,
                    client = %id,
                    error = %failure,
                    "closing control client after diagnostic"
                );
                client.enqueue_farewell(diagnostic.into_envelope(None));
                self.sync_interest(id);
            }
            None => {
                if matches!(failure, ConnectionError::PeerClosed) {
                    info!(target: CTL_TARGET, client = %id, "control client disconnected");
                } else {
                    error!(target: CTL_TARGET, client = %id, error = %failure, "control client failed");
                }
                self.destroy_client(id);
            }
        }
    }

    fn sync_interest(&mut self, id: ClientId) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        let desired = client.desired_interest();
        if desired == client.registered_interest() {
            return;
        }
        match self.reactor.reregister(Token::Client(id), desired) {
            Ok(()) => client.set_registered_interest(desired),
            Err(error) => {
                error!(target: CTL_TARGET, client = %id, %error, "failed to update client interest");
                self.destroy_client(id);
            }
        }
    }

    fn destroy_client(&mut self, id: ClientId) {
        if self.clients.remove(&id).is_some() {
            self.reactor.deregister(Token::Client(id));
            debug!(
                target: CTL_TARGET,
                client = %id,
                clients = self.clients.len(),
                "control client destroyed"
            );
        }
    }
}

impl<R, A> ControlServer<R, A> {
    fn stop(&mut self) {
        let closed = self.clients.len();
        self.clients.clear();
        if self.listener.take().is_some() {
            remove_socket(&self.path);
            info!(target: CTL_TARGET, path = %self.path, closed, "control socket closed");
        }
    }
}

impl<R, A> Drop for ControlServer<R, A> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn respond<A: OutputActions>(
    dispatcher: &mut Dispatcher<A>,
    subscribed: &mut bool,
    value: Value,
) -> Value {
    let request = match Request::from_value(value) {
        Ok(request) => request,
        Err(rejected) => {
            debug!(target: CTL_TARGET, error = %rejected.error, "rejected request envelope");
            return CommandResponse::from(rejected.error).into_envelope(rejected.id);
        }
    };
    let response = match Command::parse(&request.method, request.params.as_ref()) {
        Ok(command) => dispatcher.dispatch(command, subscribed),
        Err(error) => {
            debug!(
                target: CTL_TARGET,
                method = %request.method,
                error = %error,
                "rejected control request"
            );
            CommandResponse::from(error)
        }
    };
    let envelope = response.into_envelope(request.id);
    debug!(target: CTL_TARGET, "response:\n{}", pretty(&envelope));
    envelope
}
