//! Shared configuration for the wayvnc control daemon.
//!
//! Configuration is read from the command line with environment variable
//! fallbacks (`WAYVNC_*`). Values given as flags win over the environment,
//! which in turn wins over the built-in defaults. The control socket path
//! defaults to `$XDG_RUNTIME_DIR/wayvncctl` and falls back to a per-user path
//! under the temporary directory when no runtime directory is available.

mod defaults;
mod logging;
mod socket;

use std::ffi::OsString;

use camino::Utf8PathBuf;
use clap::Parser;

pub use defaults::{
    CONTROL_SOCKET_NAME, DEFAULT_LOG_FILTER, DEFAULT_MAX_QUEUED_MESSAGES, ResolvedSocketPath,
    SocketPathSource, default_log_format, default_socket_path,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketPreparationError, prepare_socket_directory};

/// Version string reported for embedded engines whose version is not known.
pub const UNKNOWN_ENGINE_VERSION: &str = "unknown";

/// Runtime configuration for `wayvncd`.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    name = "wayvncd",
    version,
    about = "Control socket daemon for the wayvnc screen-sharing server"
)]
pub struct Config {
    /// Path of the control socket.
    #[arg(short = 'S', long = "socket", env = "WAYVNC_CTL_SOCKET")]
    pub socket_path: Option<Utf8PathBuf>,

    /// `tracing` filter expression applied to daemon logs.
    ///
    /// A bare level applies to the daemon's own targets only; other crates
    /// are capped at `warn`.
    #[arg(long, env = "WAYVNC_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Log output format (`compact` or `json`).
    #[arg(long, env = "WAYVNC_LOG_FORMAT", default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Names of the outputs available for capture, in cycling order.
    #[arg(
        short = 'o',
        long = "output",
        env = "WAYVNC_OUTPUTS",
        value_delimiter = ','
    )]
    pub outputs: Vec<String>,

    /// Maximum number of messages queued for a single control client.
    #[arg(
        long,
        env = "WAYVNC_MAX_QUEUED_MESSAGES",
        default_value_t = DEFAULT_MAX_QUEUED_MESSAGES
    )]
    pub max_queued_messages: usize,

    /// Version reported for the embedded VNC server library.
    #[arg(long, env = "WAYVNC_NEATVNC_VERSION", default_value = UNKNOWN_ENGINE_VERSION)]
    pub neatvnc_version: String,

    /// Version reported for the embedded event loop library.
    #[arg(long, env = "WAYVNC_AML_VERSION", default_value = UNKNOWN_ENGINE_VERSION)]
    pub aml_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: None,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            outputs: Vec::new(),
            max_queued_messages: DEFAULT_MAX_QUEUED_MESSAGES,
            neatvnc_version: UNKNOWN_ENGINE_VERSION.to_owned(),
            aml_version: UNKNOWN_ENGINE_VERSION.to_owned(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns the `clap` error describing the invalid or unknown argument.
    /// Help and version requests are also reported through this error.
    pub fn load() -> Result<Self, clap::Error> {
        Self::try_parse()
    }

    /// Loads configuration from an explicit argument vector.
    ///
    /// The first element is treated as the program name.
    ///
    /// # Errors
    ///
    /// Returns the `clap` error describing the invalid or unknown argument.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args)
    }

    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Resolves the control socket path, falling back to the default layout.
    #[must_use]
    pub fn resolve_socket_path(&self) -> ResolvedSocketPath {
        match &self.socket_path {
            Some(path) => ResolvedSocketPath {
                path: path.clone(),
                source: SocketPathSource::Explicit,
            },
            None => default_socket_path(),
        }
    }
}
