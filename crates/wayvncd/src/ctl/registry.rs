//! Static catalog of control commands and events.
//!
//! Both catalogs are small and fixed, so lookups are plain linear scans over
//! the ordered `ALL` arrays. The descriptors double as the source for `help`
//! output.

/// A documented parameter of a command or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamInfo {
    /// Parameter name as it appears on the wire.
    pub name: &'static str,
    /// Human readable description.
    pub description: &'static str,
}

/// Name, description, and parameters of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// Method name as it appears on the wire.
    pub name: &'static str,
    /// Human readable description.
    pub description: &'static str,
    /// Ordered parameter documentation.
    pub params: &'static [ParamInfo],
}

const fn param(name: &'static str, description: &'static str) -> ParamInfo {
    ParamInfo { name, description }
}

static HELP: Descriptor = Descriptor {
    name: "help",
    description: "List all commands and events, or show usage of a specific command or event",
    params: &[
        param("command", "The command to show (optional)"),
        param("event", "The event to show (optional)"),
    ],
};

static VERSION: Descriptor = Descriptor {
    name: "version",
    description: "Query the version of the wayvnc process",
    params: &[],
};

static EVENT_RECEIVE: Descriptor = Descriptor {
    name: "event-receive",
    description: "Register to begin receiving asynchronous events from wayvnc",
    params: &[],
};

static SET_OUTPUT: Descriptor = Descriptor {
    name: "set-output",
    description: "Switch the actively captured output",
    params: &[
        param("switch-to", "The specific output name to capture"),
        param("cycle", "Either \"next\" or \"prev\""),
    ],
};

static GET_OUTPUTS: Descriptor = Descriptor {
    name: "get-outputs",
    description: "Return a list of all currently detected Wayland outputs",
    params: &[],
};

static WAYVNC_EXIT: Descriptor = Descriptor {
    name: "wayvnc-exit",
    description: "Disconnect all clients and shut down wayvnc",
    params: &[],
};

static CLIENT_CONNECTED: Descriptor = Descriptor {
    name: "client-connected",
    description: "Sent when a new vnc client connects to wayvnc",
    params: &[
        param("id", "A unique identifier for this client"),
        param(
            "connection_count",
            "The total number of connected VNC clients including this one.",
        ),
        param(
            "hostname",
            "The hostname or IP address of this client (may be null)",
        ),
        param(
            "username",
            "The username used to authenticate this client (may be null).",
        ),
    ],
};

static CLIENT_DISCONNECTED: Descriptor = Descriptor {
    name: "client-disconnected",
    description: "Sent when a vnc client disconnects from wayvnc",
    params: &[
        param("id", "A unique identifier for this client"),
        param(
            "connection_count",
            "The total number of connected VNC clients not including this one.",
        ),
        param(
            "hostname",
            "The hostname or IP address of this client (may be null)",
        ),
        param(
            "username",
            "The username used to authenticate this client (may be null).",
        ),
    ],
};

static CAPTURE_CHANGED: Descriptor = Descriptor {
    name: "capture-changed",
    description: "Sent when wayvnc changes which output is captured",
    params: &[param("output", "The name of the output now being captured")],
};

/// Commands understood by the control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `help`
    Help,
    /// `version`
    Version,
    /// `event-receive`
    EventReceive,
    /// `set-output`
    SetOutput,
    /// `get-outputs`
    GetOutputs,
    /// `wayvnc-exit`
    WayvncExit,
}

impl CommandKind {
    /// Every command, in catalog order.
    pub const ALL: [Self; 6] = [
        Self::Help,
        Self::Version,
        Self::EventReceive,
        Self::SetOutput,
        Self::GetOutputs,
        Self::WayvncExit,
    ];

    /// Catalog entry for this command.
    pub const fn descriptor(self) -> &'static Descriptor {
        match self {
            Self::Help => &HELP,
            Self::Version => &VERSION,
            Self::EventReceive => &EVENT_RECEIVE,
            Self::SetOutput => &SET_OUTPUT,
            Self::GetOutputs => &GET_OUTPUTS,
            Self::WayvncExit => &WAYVNC_EXIT,
        }
    }

    /// Wire name of the command.
    pub const fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Resolves a wire name to a command.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Events delivered to subscribed control clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `client-connected`
    ClientConnected,
    /// `client-disconnected`
    ClientDisconnected,
    /// `capture-changed`
    CaptureChanged,
}

impl EventKind {
    /// Every event, in catalog order.
    pub const ALL: [Self; 3] = [
        Self::ClientConnected,
        Self::ClientDisconnected,
        Self::CaptureChanged,
    ];

    /// Catalog entry for this event.
    pub const fn descriptor(self) -> &'static Descriptor {
        match self {
            Self::ClientConnected => &CLIENT_CONNECTED,
            Self::ClientDisconnected => &CLIENT_DISCONNECTED,
            Self::CaptureChanged => &CAPTURE_CHANGED,
        }
    }

    /// Wire name of the event.
    pub const fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Resolves a wire name to an event.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Names of every command, in catalog order.
pub fn command_names() -> Vec<&'static str> {
    CommandKind::ALL.into_iter().map(CommandKind::name).collect()
}

/// Names of every event, in catalog order.
pub fn event_names() -> Vec<&'static str> {
    EventKind::ALL.into_iter().map(EventKind::name).collect()
}
