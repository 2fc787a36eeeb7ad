//! Output selection backing the control socket actions.
//!
//! The daemon does not talk to a compositor here. It tracks a fixed, ordered
//! list of output names taken from configuration and which one is captured.

use serde_json::{Map, Value, json};
use tracing::info;

use crate::ctl::{CommandResponse, CycleDirection, OutputActions};

pub(crate) const OUTPUTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::outputs");

/// Ordered set of named outputs with a current capture target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticOutputs {
    names: Vec<String>,
    current: usize,
    pending_change: Option<String>,
    exit_requested: bool,
}

impl StaticOutputs {
    /// Creates the set; the first name starts out captured.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Name of the captured output, if any outputs are known.
    pub fn current(&self) -> Option<&str> {
        self.names.get(self.current).map(String::as_str)
    }

    /// Whether a client asked the daemon to exit.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Takes the output captured since the last call, if it changed.
    pub fn take_capture_change(&mut self) -> Option<String> {
        self.pending_change.take()
    }

    fn capture(&mut self, index: usize) -> CommandResponse {
        self.current = index;
        let name = self.names[index].clone();
        info!(target: OUTPUTS_TARGET, output = %name, "capturing output");
        self.pending_change = Some(name);
        CommandResponse::ok()
    }
}

impl OutputActions for StaticOutputs {
    fn switch_output(&mut self, name: &str) -> CommandResponse {
        match self.names.iter().position(|candidate| candidate == name) {
            Some(index) => self.capture(index),
            None => CommandResponse::failed("No such output"),
        }
    }

    fn cycle_output(&mut self, direction: CycleDirection) -> CommandResponse {
        let count = self.names.len();
        if count == 0 {
            return CommandResponse::failed("No outputs available");
        }
        let index = match direction {
            CycleDirection::Forward => (self.current + 1) % count,
            CycleDirection::Reverse => (self.current + count - 1) % count,
        };
        self.capture(index)
    }

    fn list_outputs(&mut self) -> CommandResponse {
        let outputs: Vec<Value> = self
            .names
            .iter()
            .enumerate()
            .map(|(index, name)| json!({"name": name, "captured": index == self.current}))
            .collect();
        let mut data = Map::new();
        data.insert("outputs".to_owned(), Value::Array(outputs));
        CommandResponse::ok_with(data)
    }

    fn request_exit(&mut self) -> CommandResponse {
        info!(target: OUTPUTS_TARGET, "exit requested over control socket");
        self.exit_requested = true;
        CommandResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctl::code;
    use rstest::{fixture, rstest};

    #[fixture]
    fn outputs() -> StaticOutputs {
        StaticOutputs::new(["HDMI-A-1", "DP-1", "DP-2"])
    }

    #[rstest]
    #[case::forward(CycleDirection::Forward, "DP-1")]
    #[case::reverse_wraps(CycleDirection::Reverse, "DP-2")]
    fn cycling_wraps_around(
        mut outputs: StaticOutputs,
        #[case] direction: CycleDirection,
        #[case] expected: &str,
    ) {
        assert!(outputs.cycle_output(direction).is_success());
        assert_eq!(outputs.current(), Some(expected));
        assert_eq!(outputs.take_capture_change().as_deref(), Some(expected));
        assert_eq!(outputs.take_capture_change(), None);
    }

    #[rstest]
    fn forward_cycle_wraps_to_first(mut outputs: StaticOutputs) {
        assert!(outputs.switch_output("DP-2").is_success());
        assert!(outputs.cycle_output(CycleDirection::Forward).is_success());
        assert_eq!(outputs.current(), Some("HDMI-A-1"));
    }

    #[rstest]
    fn unknown_output_is_rejected(mut outputs: StaticOutputs) {
        let response = outputs.switch_output("VGA-1");
        assert_eq!(response, CommandResponse::failed("No such output"));
        assert_eq!(response.code(), code::FAILED);
        assert_eq!(outputs.current(), Some("HDMI-A-1"));
        assert_eq!(outputs.take_capture_change(), None);
    }

    #[test]
    fn cycling_without_outputs_fails() {
        let mut outputs = StaticOutputs::default();
        assert!(!outputs.cycle_output(CycleDirection::Forward).is_success());
        assert_eq!(outputs.current(), None);
    }

    #[rstest]
    fn listing_marks_the_captured_output(mut outputs: StaticOutputs) {
        outputs.switch_output("DP-1");
        let envelope = outputs.list_outputs().into_envelope(None);
        assert_eq!(
            envelope,
            json!({
                "code": 0,
                "outputs": [
                    {"name": "HDMI-A-1", "captured": false},
                    {"name": "DP-1", "captured": true},
                    {"name": "DP-2", "captured": false}
                ]
            })
        );
    }

    #[rstest]
    fn exit_request_latches(mut outputs: StaticOutputs) {
        assert!(!outputs.exit_requested());
        assert!(outputs.request_exit().is_success());
        assert!(outputs.exit_requested());
    }
}
