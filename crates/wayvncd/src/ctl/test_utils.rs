//! Test doubles for the control socket.

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Read, Write};
use std::os::fd::RawFd;
use std::time::Duration;

use super::actions::OutputActions;
use super::command::CycleDirection;
use super::reactor::{ClientId, Interest, Reactor, ReadyEvent, Token};
use super::response::CommandResponse;

/// Action invocation recorded by [`StubActions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ActionCall {
    Switch(String),
    Cycle(CycleDirection),
    List,
    Exit,
}

/// Output actions that record calls and answer with a canned response.
#[derive(Debug, Default)]
pub(crate) struct StubActions {
    pub(crate) calls: Vec<ActionCall>,
    pub(crate) reply: Option<CommandResponse>,
}

impl StubActions {
    fn answer(&mut self, call: ActionCall) -> CommandResponse {
        self.calls.push(call);
        self.reply.clone().unwrap_or_else(CommandResponse::ok)
    }
}

impl OutputActions for StubActions {
    fn switch_output(&mut self, name: &str) -> CommandResponse {
        self.answer(ActionCall::Switch(name.to_owned()))
    }

    fn cycle_output(&mut self, direction: CycleDirection) -> CommandResponse {
        self.answer(ActionCall::Cycle(direction))
    }

    fn list_outputs(&mut self) -> CommandResponse {
        self.answer(ActionCall::List)
    }

    fn request_exit(&mut self) -> CommandResponse {
        self.answer(ActionCall::Exit)
    }
}

/// In-memory stream replaying scripted reads and write results.
///
/// Reads with nothing scripted report would-block. Writes with nothing
/// scripted accept the whole buffer.
#[derive(Debug, Default)]
pub(crate) struct ScriptedStream {
    reads: VecDeque<Vec<u8>>,
    writes: VecDeque<io::Result<usize>>,
    pub(crate) written: Vec<u8>,
}

impl ScriptedStream {
    pub(crate) fn push_read(&mut self, bytes: &[u8]) {
        self.reads.push_back(bytes.to_vec());
    }

    pub(crate) fn push_write_limit(&mut self, limit: usize) {
        self.writes.push_back(Ok(limit));
    }

    pub(crate) fn push_would_block(&mut self) {
        self.writes
            .push_back(Err(io::Error::from(io::ErrorKind::WouldBlock)));
    }

    pub(crate) fn push_write_error(&mut self, kind: io::ErrorKind) {
        self.writes.push_back(Err(io::Error::from(kind)));
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(mut chunk) = self.reads.pop_front() else {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        };
        let count = chunk.len().min(buf.len());
        buf[..count].copy_from_slice(&chunk[..count]);
        if count < chunk.len() {
            self.reads.push_front(chunk.split_off(count));
        }
        Ok(count)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let count = match self.writes.pop_front() {
            None => buf.len(),
            Some(Ok(limit)) => limit.min(buf.len()),
            Some(Err(error)) => return Err(error),
        };
        self.written.extend_from_slice(&buf[..count]);
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reactor that records registrations and replays scripted readiness.
///
/// The `refuse_*` switches make the matching calls fail with
/// `PermissionDenied`.
#[derive(Debug, Default)]
pub(crate) struct RecordingReactor {
    pub(crate) registrations: BTreeMap<Token, (RawFd, Interest)>,
    pub(crate) reregister_calls: usize,
    pub(crate) pending: VecDeque<Vec<ReadyEvent>>,
    pub(crate) refuse_listener: bool,
    pub(crate) refuse_clients: bool,
    pub(crate) refuse_reregister: bool,
}

impl RecordingReactor {
    fn refuses(&self, token: Token) -> bool {
        match token {
            Token::Listener => self.refuse_listener,
            Token::Client(_) => self.refuse_clients,
        }
    }

    pub(crate) fn interest(&self, token: Token) -> Option<Interest> {
        self.registrations.get(&token).map(|(_, interest)| *interest)
    }

    pub(crate) fn is_registered(&self, token: Token) -> bool {
        self.registrations.contains_key(&token)
    }

    pub(crate) fn clients(&self) -> Vec<ClientId> {
        self.registrations
            .keys()
            .filter_map(|token| match token {
                Token::Client(id) => Some(*id),
                Token::Listener => None,
            })
            .collect()
    }

    pub(crate) fn push_ready(&mut self, events: Vec<ReadyEvent>) {
        self.pending.push_back(events);
    }
}

impl Reactor for RecordingReactor {
    fn register(&mut self, token: Token, fd: RawFd, interest: Interest) -> io::Result<()> {
        if self.refuses(token) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.registrations.insert(token, (fd, interest));
        Ok(())
    }

    fn reregister(&mut self, token: Token, interest: Interest) -> io::Result<()> {
        if self.refuse_reregister {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        let entry = self
            .registrations
            .get_mut(&token)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        entry.1 = interest;
        self.reregister_calls += 1;
        Ok(())
    }

    fn deregister(&mut self, token: Token) {
        self.registrations.remove(&token);
    }

    fn poll(&mut self, _timeout: Option<Duration>) -> io::Result<Vec<ReadyEvent>> {
        Ok(self.pending.pop_front().unwrap_or_default())
    }
}
