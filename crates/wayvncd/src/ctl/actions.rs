//! Collaborators the control socket delegates to.
//!
//! Output switching, output listing, and shutdown belong to the rest of the
//! daemon. The dispatcher passes their responses through untouched.

use super::command::CycleDirection;
use super::response::CommandResponse;

/// Output-related actions implemented outside the control socket.
pub trait OutputActions {
    /// Starts capturing the named output.
    fn switch_output(&mut self, name: &str) -> CommandResponse;

    /// Moves capture to the neighbouring output.
    fn cycle_output(&mut self, direction: CycleDirection) -> CommandResponse;

    /// Reports the known outputs.
    fn list_outputs(&mut self) -> CommandResponse;

    /// Asks the daemon to shut down.
    fn request_exit(&mut self) -> CommandResponse;
}

/// Component versions reported by the `version` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Version of the daemon itself.
    pub wayvnc: String,
    /// Version of the embedded VNC server library.
    pub neatvnc: String,
    /// Version of the embedded event loop library.
    pub aml: String,
}

impl VersionInfo {
    /// Daemon version plus the supplied engine versions.
    pub fn with_engines(neatvnc: impl Into<String>, aml: impl Into<String>) -> Self {
        Self {
            wayvnc: env!("CARGO_PKG_VERSION").to_owned(),
            neatvnc: neatvnc.into(),
            aml: aml.into(),
        }
    }
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self::with_engines(
            wayvnc_config::UNKNOWN_ENGINE_VERSION,
            wayvnc_config::UNKNOWN_ENGINE_VERSION,
        )
    }
}
