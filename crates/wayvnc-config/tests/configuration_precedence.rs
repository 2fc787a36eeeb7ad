//! Precedence between command-line flags, environment, and defaults.

use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard};

use camino::Utf8PathBuf;
use once_cell::sync::Lazy;
use rstest::{fixture, rstest};

use wayvnc_config::{
    Config, DEFAULT_LOG_FILTER, DEFAULT_MAX_QUEUED_MESSAGES, LogFormat, SocketPathSource,
};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const MANAGED_KEYS: &[&str] = &[
    "WAYVNC_CTL_SOCKET",
    "WAYVNC_LOG_FILTER",
    "WAYVNC_LOG_FORMAT",
    "WAYVNC_OUTPUTS",
    "WAYVNC_MAX_QUEUED_MESSAGES",
    "WAYVNC_NEATVNC_VERSION",
    "WAYVNC_AML_VERSION",
];

/// Serialises environment mutation and restores the previous values on drop.
struct EnvGuard {
    previous: Vec<(&'static str, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    fn new() -> Self {
        let lock = ENV_MUTEX
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = MANAGED_KEYS
            .iter()
            .map(|key| (*key, std::env::var_os(key)))
            .collect();
        for key in MANAGED_KEYS {
            // Environment mutation is `unsafe` in edition 2024; the mutex keeps
            // the tests in this binary from racing each other.
            unsafe { std::env::remove_var(key) };
        }
        Self {
            previous,
            _lock: lock,
        }
    }

    fn set(&self, key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) };
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..) {
            match value {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

#[fixture]
fn env() -> EnvGuard {
    EnvGuard::new()
}

#[rstest]
fn defaults_apply_without_flags_or_environment(env: EnvGuard) {
    let config = Config::load_from_iter(["wayvncd"]).expect("load defaults");
    drop(env);

    assert_eq!(config.socket_path, None);
    assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
    assert_eq!(config.log_format(), LogFormat::Compact);
    assert!(config.outputs.is_empty());
    assert_eq!(config.max_queued_messages, DEFAULT_MAX_QUEUED_MESSAGES);
}

#[rstest]
fn environment_overrides_defaults(env: EnvGuard) {
    env.set("WAYVNC_CTL_SOCKET", "/run/env/wayvncctl");
    env.set("WAYVNC_LOG_FORMAT", "json");
    env.set("WAYVNC_OUTPUTS", "DP-1,HDMI-A-1");

    let config = Config::load_from_iter(["wayvncd"]).expect("load from environment");
    drop(env);

    assert_eq!(
        config.socket_path,
        Some(Utf8PathBuf::from("/run/env/wayvncctl"))
    );
    assert_eq!(config.log_format(), LogFormat::Json);
    assert_eq!(config.outputs, vec!["DP-1".to_owned(), "HDMI-A-1".to_owned()]);
}

#[rstest]
fn command_line_overrides_environment(env: EnvGuard) {
    env.set("WAYVNC_CTL_SOCKET", "/run/env/wayvncctl");
    env.set("WAYVNC_LOG_FILTER", "warn");

    let config = Config::load_from_iter([
        "wayvncd",
        "--socket",
        "/run/cli/wayvncctl",
        "--log-filter",
        "wayvncd=trace",
    ])
    .expect("load from cli");
    drop(env);

    let resolved = config.resolve_socket_path();
    assert_eq!(resolved.path, Utf8PathBuf::from("/run/cli/wayvncctl"));
    assert_eq!(resolved.source, SocketPathSource::Explicit);
    assert_eq!(config.log_filter(), "wayvncd=trace");
}

#[rstest]
#[case::repeated(&["wayvncd", "-o", "DP-1", "-o", "DP-2"])]
#[case::delimited(&["wayvncd", "--output", "DP-1,DP-2"])]
fn outputs_accept_repeated_and_delimited_forms(env: EnvGuard, #[case] args: &[&str]) {
    let config = Config::load_from_iter(args.iter().copied()).expect("load outputs");
    drop(env);

    assert_eq!(config.outputs, vec!["DP-1".to_owned(), "DP-2".to_owned()]);
}

#[rstest]
fn invalid_log_format_fails_fast(env: EnvGuard) {
    let error = Config::load_from_iter(["wayvncd", "--log-format", "pretty"])
        .expect_err("invalid format should fail");
    drop(env);

    assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
}

#[rstest]
fn invalid_queue_depth_fails_fast(env: EnvGuard) {
    env.set("WAYVNC_MAX_QUEUED_MESSAGES", "lots");
    let error = Config::load_from_iter(["wayvncd"]).expect_err("invalid depth should fail");
    drop(env);

    assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
}
