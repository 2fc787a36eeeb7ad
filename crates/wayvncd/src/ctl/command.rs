//! Typed commands parsed from control requests.
//!
//! Parameter validation is strict: mutually exclusive parameters are checked
//! here so the dispatcher only ever sees well-formed commands.

use serde_json::{Map, Value};
use tracing::trace;

use super::CTL_TARGET;
use super::errors::RequestError;
use super::registry::{CommandKind, command_names};

/// Direction used when cycling through outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDirection {
    /// Move to the next output.
    Forward,
    /// Move to the previous output.
    Reverse,
}

impl CycleDirection {
    /// Parses the `cycle` parameter.
    ///
    /// `"next"` selects [`Self::Forward`]; anything starting with `"prev"`
    /// selects [`Self::Reverse`].
    pub fn parse(value: &str) -> Option<Self> {
        if value.starts_with("prev") {
            Some(Self::Reverse)
        } else if value == "next" {
            Some(Self::Forward)
        } else {
            None
        }
    }
}

/// Catalog entry requested by `help`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelpTopic {
    /// Describe a command.
    Command(String),
    /// Describe an event.
    Event(String),
}

/// Target of a `set-output` command. Exactly one form is ever present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Switch to the named output.
    Named(String),
    /// Cycle through outputs in the given direction.
    Cycle(CycleDirection),
}

/// A validated control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the catalogs, or describe one entry.
    Help(Option<HelpTopic>),
    /// Report component versions.
    Version,
    /// Subscribe the connection to events.
    EventReceive,
    /// Change the captured output.
    SetOutput(OutputTarget),
    /// List the known outputs.
    GetOutputs,
    /// Shut the daemon down.
    WayvncExit,
}

impl Command {
    /// Parses a method name and its parameters into a command.
    ///
    /// # Errors
    ///
    /// Returns a not-found error listing every valid command when `method` is
    /// unknown, or a validation error when the parameters are unacceptable.
    pub fn parse(method: &str, params: Option<&Value>) -> Result<Self, RequestError> {
        trace!(target: CTL_TARGET, method, "parsing command");
        let Some(kind) = CommandKind::from_name(method) else {
            return Err(
                RequestError::not_found(format!("Unknown command \"{method}\""))
                    .with_field("commands", command_names()),
            );
        };
        match kind {
            CommandKind::Help => parse_help(params),
            CommandKind::SetOutput => parse_set_output(params),
            CommandKind::Version => Ok(Self::Version),
            CommandKind::EventReceive => Ok(Self::EventReceive),
            CommandKind::GetOutputs => Ok(Self::GetOutputs),
            CommandKind::WayvncExit => Ok(Self::WayvncExit),
        }
    }

    /// Catalog entry for the command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Help(_) => CommandKind::Help,
            Self::Version => CommandKind::Version,
            Self::EventReceive => CommandKind::EventReceive,
            Self::SetOutput(_) => CommandKind::SetOutput,
            Self::GetOutputs => CommandKind::GetOutputs,
            Self::WayvncExit => CommandKind::WayvncExit,
        }
    }
}

fn parse_help(params: Option<&Value>) -> Result<Command, RequestError> {
    const EXPECTED: &str = "expecting \"command\" or \"event\" (optional)";
    let (command, event) = match params {
        None | Some(Value::Null) => (None, None),
        Some(Value::Object(map)) => (
            optional_string(map, "command").ok_or_else(|| RequestError::invalid(EXPECTED))?,
            optional_string(map, "event").ok_or_else(|| RequestError::invalid(EXPECTED))?,
        ),
        Some(_) => return Err(RequestError::invalid(EXPECTED)),
    };
    match (command, event) {
        (Some(_), Some(_)) => Err(RequestError::invalid(
            "expecting exactly one of \"command\" or \"event\"",
        )),
        (Some(name), None) => Ok(Command::Help(Some(HelpTopic::Command(name.to_owned())))),
        (None, Some(name)) => Ok(Command::Help(Some(HelpTopic::Event(name.to_owned())))),
        (None, None) => Ok(Command::Help(None)),
    }
}

fn parse_set_output(params: Option<&Value>) -> Result<Command, RequestError> {
    const EXPECTED: &str = "expecting \"switch-to\" or \"cycle\"";
    let Some(Value::Object(map)) = params else {
        return Err(RequestError::invalid(EXPECTED));
    };
    let target = optional_string(map, "switch-to").ok_or_else(|| RequestError::invalid(EXPECTED))?;
    let cycle = optional_string(map, "cycle").ok_or_else(|| RequestError::invalid(EXPECTED))?;
    match (target, cycle) {
        (Some(name), None) => Ok(Command::SetOutput(OutputTarget::Named(name.to_owned()))),
        (None, Some(direction)) => CycleDirection::parse(direction)
            .map(|direction| Command::SetOutput(OutputTarget::Cycle(direction)))
            .ok_or_else(|| RequestError::invalid("cycle must either be \"next\" or \"prev\"")),
        (Some(_), Some(_)) | (None, None) => Err(RequestError::invalid(
            "expecting exactly one of \"switch-to\" or \"cycle\"",
        )),
    }
}

/// Reads an optional string field. Missing and `null` count as absent.
///
/// Returns `None` when the field holds a non-string value.
fn optional_string<'a>(map: &'a Map<String, Value>, key: &str) -> Option<Option<&'a str>> {
    match map.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(value)) => Some(Some(value.as_str())),
        Some(_) => None,
    }
}
