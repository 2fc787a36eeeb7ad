//! Structured log initialisation for the daemon.
//!
//! A configured filter that is only a level (for example `info`) applies that
//! level to the daemon's own targets and caps every other target at `warn`.
//! Filters naming any target are passed to [`EnvFilter`] unchanged.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

use wayvnc_config::{Config, LogFormat};

use crate::ctl::CTL_TARGET;
use crate::outputs::OUTPUTS_TARGET;
use crate::process::PROCESS_TARGET;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Log targets emitted by the daemon itself.
const DAEMON_TARGETS: [&str; 3] = [CTL_TARGET, OUTPUTS_TARGET, PROCESS_TARGET];

/// Ceiling applied to targets outside the daemon for level-only filters.
const FOREIGN_CEILING: LevelFilter = LevelFilter::WARN;

/// Handle returned once logging is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring logging.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter {filter:?}: {message}")]
    Filter {
        /// Expanded filter expression.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another global subscriber was already installed.
    #[error("failed to install log subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// Later calls return a handle without touching global state.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = build_filter(config.log_filter())?;
    let format = config.log_format();

    let json = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(io::stderr)
            .with_timer(fmt::time::UtcTime::rfc_3339())
    });
    let compact = (format == LogFormat::Compact).then(|| {
        fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(compact);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_filter(configured: &str) -> Result<EnvFilter, TelemetryError> {
    let filter = expand_filter(configured);
    EnvFilter::try_new(&filter).map_err(|error| TelemetryError::Filter {
        message: error.to_string(),
        filter,
    })
}

/// Expands a level-only filter into per-target directives.
fn expand_filter(configured: &str) -> String {
    let directives: Vec<&str> = configured
        .split(',')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .collect();
    let Some(level) = bare_level(&directives) else {
        return configured.to_owned();
    };
    let mut expanded = level.min(FOREIGN_CEILING).to_string();
    for target in DAEMON_TARGETS {
        expanded.push_str(&format!(",{target}={level}"));
    }
    expanded
}

/// The most verbose level when every directive is a bare level.
fn bare_level(directives: &[&str]) -> Option<LevelFilter> {
    directives
        .iter()
        .map(|directive| directive.parse::<LevelFilter>().ok())
        .collect::<Option<Vec<_>>>()?
        .into_iter()
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::info(
        "info",
        "warn,wayvncd::ctl=info,wayvncd::outputs=info,wayvncd::process=info"
    )]
    #[case::debug_spaced(
        " debug ",
        "warn,wayvncd::ctl=debug,wayvncd::outputs=debug,wayvncd::process=debug"
    )]
    #[case::error_below_ceiling(
        "error",
        "error,wayvncd::ctl=error,wayvncd::outputs=error,wayvncd::process=error"
    )]
    #[case::most_verbose_wins(
        "warn,trace",
        "warn,wayvncd::ctl=trace,wayvncd::outputs=trace,wayvncd::process=trace"
    )]
    fn level_only_filters_target_the_daemon(#[case] configured: &str, #[case] expected: &str) {
        assert_eq!(expand_filter(configured), expected);
    }

    #[rstest]
    #[case::explicit_target("info,wayvncd::ctl=trace")]
    #[case::bare_target("wayvncd")]
    #[case::empty("")]
    fn filters_naming_targets_pass_through(#[case] configured: &str) {
        assert_eq!(expand_filter(configured), configured);
    }

    #[test]
    fn expanded_filter_parses() {
        assert!(build_filter("debug").is_ok());
    }

    #[test]
    fn rejects_malformed_filter_before_installing() {
        let config = Config {
            log_filter: "wayvncd=loud".to_owned(),
            ..Config::default()
        };
        assert!(matches!(
            install_subscriber(&config),
            Err(TelemetryError::Filter { .. })
        ));
    }
}
