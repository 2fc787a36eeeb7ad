//! Response and event envelopes for the control protocol.
//!
//! Responses echo the request `id` (when one was supplied), carry a numeric
//! `code`, and flatten the payload fields into the same object:
//!
//! ```json
//! {"id":1,"code":0,"wayvnc":"0.1.0","neatvnc":"unknown","aml":"unknown"}
//! ```
//!
//! Events carry a method name and a parameter object but no `id`:
//!
//! ```json
//! {"method":"client-connected","params":{"id":"0x1","connection_count":1,"hostname":null,"username":null}}
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use super::registry::EventKind;

/// Result codes used on the wire.
///
/// Failures reuse errno values the way the reference daemon always has.
pub mod code {
    /// The command succeeded.
    pub const OK: i32 = 0;
    /// An output action reported a failure.
    pub const FAILED: i32 = 1;
    /// The requested command does not exist.
    pub const NOT_FOUND: i32 = libc::ENOENT;
    /// An internal or connection-fatal error.
    pub const IO_ERROR: i32 = libc::EIO;
    /// The request parameters failed validation.
    pub const INVALID_ARGUMENT: i32 = libc::EINVAL;
}

/// Outcome of a command: a result code plus an optional payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    code: i32,
    data: Option<Map<String, Value>>,
}

impl CommandResponse {
    /// Creates a response with an explicit code and payload.
    pub fn new(code: i32, data: Option<Map<String, Value>>) -> Self {
        Self { code, data }
    }

    /// Successful response without a payload.
    pub fn ok() -> Self {
        Self::new(code::OK, None)
    }

    /// Successful response carrying `data`.
    pub fn ok_with(data: Map<String, Value>) -> Self {
        Self::new(code::OK, Some(data))
    }

    /// Failed response with code 1 and an `error` message.
    pub fn failed(message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("error".to_owned(), Value::String(message.into()));
        Self::new(code::FAILED, Some(data))
    }

    /// Result code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Payload, if any.
    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref()
    }

    /// Whether the code signals success.
    pub fn is_success(&self) -> bool {
        self.code == code::OK
    }

    /// Wraps the response in the wire envelope, consuming it.
    ///
    /// Envelope fields take precedence over payload fields of the same name.
    pub fn into_envelope(self, id: Option<Value>) -> Value {
        let mut envelope = Map::new();
        if let Some(id) = id {
            envelope.insert("id".to_owned(), id);
        }
        envelope.insert("code".to_owned(), Value::from(self.code));
        for (name, value) in self.data.into_iter().flatten() {
            envelope.entry(name).or_insert(value);
        }
        Value::Object(envelope)
    }
}

/// Parameters shared by the client connection events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientEventParams {
    /// Unique identifier of the VNC client.
    pub id: String,
    /// Number of VNC clients connected after the change.
    pub connection_count: u32,
    /// Hostname or address of the client, when known.
    pub hostname: Option<String>,
    /// Username used to authenticate, when known.
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
struct CaptureChangedParams<'a> {
    output: &'a str,
}

/// Unsolicited notification fanned out to subscribed clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A VNC client connected.
    ClientConnected(ClientEventParams),
    /// A VNC client disconnected.
    ClientDisconnected(ClientEventParams),
    /// A different output is now being captured.
    CaptureChanged {
        /// Name of the captured output.
        output: String,
    },
}

impl ServerEvent {
    /// Catalog entry describing this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ClientConnected(_) => EventKind::ClientConnected,
            Self::ClientDisconnected(_) => EventKind::ClientDisconnected,
            Self::CaptureChanged { .. } => EventKind::CaptureChanged,
        }
    }

    /// Wraps the event in the wire envelope.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the parameters cannot be encoded.
    pub fn to_envelope(&self) -> Result<Value, serde_json::Error> {
        let params = match self {
            Self::ClientConnected(params) | Self::ClientDisconnected(params) => {
                serde_json::to_value(params)?
            }
            Self::CaptureChanged { output } => serde_json::to_value(CaptureChangedParams { output })?,
        };
        let mut envelope = Map::new();
        envelope.insert("method".to_owned(), Value::from(self.kind().name()));
        envelope.insert("params".to_owned(), params);
        Ok(Value::Object(envelope))
    }
}

/// Serializes a message in compact form for the wire.
///
/// # Errors
///
/// Returns the serializer error when the value cannot be encoded.
pub fn encode(message: &Value) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(message)
}

/// Renders a payload for human consumption in logs.
pub(crate) fn pretty(message: &Value) -> String {
    serde_json::to_string_pretty(message).unwrap_or_else(|_| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn envelope_echoes_id_and_flattens_payload() {
        let response = CommandResponse::ok_with(object(json!({"wayvnc": "1", "aml": "2"})));
        let encoded = encode(&response.into_envelope(Some(json!(1)))).expect("encode");
        assert_eq!(
            String::from_utf8(encoded).expect("utf8"),
            r#"{"id":1,"code":0,"wayvnc":"1","aml":"2"}"#
        );
    }

    #[test]
    fn envelope_omits_absent_id() {
        let envelope = CommandResponse::ok().into_envelope(None);
        assert_eq!(envelope, json!({"code": 0}));
    }

    #[test]
    fn payload_cannot_override_envelope_fields() {
        let response = CommandResponse::new(code::FAILED, Some(object(json!({"code": 99, "id": "x"}))));
        let envelope = response.into_envelope(Some(json!("req")));
        assert_eq!(envelope, json!({"id": "req", "code": 1}));
    }

    #[test]
    fn failed_response_carries_error_message() {
        let response = CommandResponse::failed("No such output");
        assert!(!response.is_success());
        assert_eq!(response.into_envelope(None), json!({"code": 1, "error": "No such output"}));
    }

    #[test]
    fn client_event_uses_method_and_params() {
        let event = ServerEvent::ClientConnected(ClientEventParams {
            id: "0x10".to_owned(),
            connection_count: 2,
            hostname: Some("laptop".to_owned()),
            username: None,
        });
        let envelope = event.to_envelope().expect("encode event");
        assert_eq!(
            envelope,
            json!({
                "method": "client-connected",
                "params": {
                    "id": "0x10",
                    "connection_count": 2,
                    "hostname": "laptop",
                    "username": null
                }
            })
        );
        assert!(envelope.get("id").is_none());
    }

    #[test]
    fn capture_changed_names_the_output() {
        let event = ServerEvent::CaptureChanged {
            output: "HDMI-A-1".to_owned(),
        };
        assert_eq!(
            event.to_envelope().expect("encode event"),
            json!({"method": "capture-changed", "params": {"output": "HDMI-A-1"}})
        );
    }
}
