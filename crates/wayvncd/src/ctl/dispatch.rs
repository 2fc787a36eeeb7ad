//! Command execution.
//!
//! Built-in commands (`help`, `version`, `event-receive`) are answered here.
//! Everything touching outputs or the process lifetime is forwarded to the
//! [`OutputActions`] collaborator and its response returned unchanged.

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::CTL_TARGET;
use super::actions::{OutputActions, VersionInfo};
use super::command::{Command, HelpTopic, OutputTarget};
use super::registry::{CommandKind, Descriptor, EventKind, command_names, event_names};
use super::response::CommandResponse;

/// Executes validated commands against the built-ins and the actions.
#[derive(Debug)]
pub struct Dispatcher<A> {
    actions: A,
    versions: VersionInfo,
}

impl<A: OutputActions> Dispatcher<A> {
    /// Builds a dispatcher around the output actions.
    pub fn new(actions: A, versions: VersionInfo) -> Self {
        Self { actions, versions }
    }

    /// Shared access to the output actions.
    pub fn actions(&self) -> &A {
        &self.actions
    }

    /// Exclusive access to the output actions.
    pub fn actions_mut(&mut self) -> &mut A {
        &mut self.actions
    }

    /// Runs `command` on behalf of a connection.
    ///
    /// `subscribed` is the connection's event subscription flag; only
    /// `event-receive` changes it.
    pub fn dispatch(&mut self, command: Command, subscribed: &mut bool) -> CommandResponse {
        info!(
            target: CTL_TARGET,
            command = command.kind().name(),
            "dispatching control command"
        );
        match command {
            Command::Help(topic) => help(topic.as_ref()),
            Command::Version => self.version(),
            Command::EventReceive => {
                *subscribed = true;
                CommandResponse::ok()
            }
            Command::SetOutput(OutputTarget::Named(name)) => self.actions.switch_output(&name),
            Command::SetOutput(OutputTarget::Cycle(direction)) => {
                self.actions.cycle_output(direction)
            }
            Command::GetOutputs => self.actions.list_outputs(),
            Command::WayvncExit => self.actions.request_exit(),
        }
    }

    fn version(&self) -> CommandResponse {
        let mut data = Map::new();
        data.insert("wayvnc".to_owned(), Value::from(self.versions.wayvnc.as_str()));
        data.insert("neatvnc".to_owned(), Value::from(self.versions.neatvnc.as_str()));
        data.insert("aml".to_owned(), Value::from(self.versions.aml.as_str()));
        CommandResponse::ok_with(data)
    }
}

fn help(topic: Option<&HelpTopic>) -> CommandResponse {
    let descriptor = match topic {
        Some(HelpTopic::Command(name)) => CommandKind::from_name(name).map(CommandKind::descriptor),
        Some(HelpTopic::Event(name)) => EventKind::from_name(name).map(EventKind::descriptor),
        None => None,
    };
    match descriptor {
        Some(descriptor) => CommandResponse::ok_with(describe(descriptor)),
        None => {
            if let Some(topic) = topic {
                debug!(target: CTL_TARGET, ?topic, "help topic not found, listing catalog");
            }
            let mut data = Map::new();
            data.insert("commands".to_owned(), Value::from(command_names()));
            data.insert("events".to_owned(), Value::from(event_names()));
            CommandResponse::ok_with(data)
        }
    }
}

fn describe(descriptor: &Descriptor) -> Map<String, Value> {
    let params: Map<String, Value> = descriptor
        .params
        .iter()
        .map(|param| (param.name.to_owned(), Value::from(param.description)))
        .collect();
    let mut entry = Map::new();
    entry.insert("description".to_owned(), Value::from(descriptor.description));
    entry.insert("params".to_owned(), Value::Object(params));
    let mut data = Map::new();
    data.insert(descriptor.name.to_owned(), Value::Object(entry));
    data
}
