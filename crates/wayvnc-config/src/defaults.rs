use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

/// File name of the control socket inside the runtime directory.
pub const CONTROL_SOCKET_NAME: &str = "wayvncctl";

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default upper bound on messages waiting in a control client's queue.
pub const DEFAULT_MAX_QUEUED_MESSAGES: usize = 64;

/// Default logging format for the daemon.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Where a resolved control socket path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPathSource {
    /// Supplied on the command line or through the environment override.
    Explicit,
    /// Derived from the per-user runtime directory (`XDG_RUNTIME_DIR`).
    RuntimeDir,
    /// The runtime directory is unavailable; a per-uid temp path is used.
    TempFallback,
}

/// A control socket path together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSocketPath {
    /// Filesystem path of the socket node.
    pub path: Utf8PathBuf,
    /// How the path was chosen.
    pub source: SocketPathSource,
}

/// Computes the default control socket path.
///
/// Mirrors the historical layout: `$XDG_RUNTIME_DIR/wayvncctl` when the
/// runtime directory is known, otherwise `/tmp/wayvncctl-<uid>`.
#[must_use]
pub fn default_socket_path() -> ResolvedSocketPath {
    match runtime_base_directory() {
        Some(base) => ResolvedSocketPath {
            path: base.join(CONTROL_SOCKET_NAME),
            source: SocketPathSource::RuntimeDir,
        },
        None => ResolvedSocketPath {
            path: fallback_base_directory().join(format!("{CONTROL_SOCKET_NAME}-{}", user_id())),
            source: SocketPathSource::TempFallback,
        },
    }
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    None
}

fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_id() -> u32 {
    // SAFETY: `geteuid` takes no arguments, cannot fail, and touches no memory
    // owned by Rust.
    unsafe { geteuid() }
}

#[cfg(not(unix))]
fn user_id() -> u32 {
    0
}
