//! Logging for the `captain` binary
//!
//! Hub runs, spoke allocation and workcell GC report through `tracing`.
//! `captain` installs a single subscriber at startup, filtered at the level
//! from `--log` or `[core] log_level`; a set `RUST_LOG` replaces that filter.
//! Debug builds print pretty lines for the terminal. Release builds print JSON
//! lines carrying the current span, independent of the `--json` output flag.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter applied when `RUST_LOG` is unset
fn default_filter(log_level: &str) -> String {
    format!("{0},captain_engine={0},sdk={0}", log_level)
}

/// Install the process-wide subscriber
///
/// Returns false if a subscriber was already installed; the first one stays.
pub fn init_telemetry_with_level(log_level: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    #[cfg(debug_assertions)]
    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().pretty().with_target(false))
        .try_init()
        .is_ok();

    #[cfg(not(debug_assertions))]
    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_current_span(true))
        .try_init()
        .is_ok();

    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_covers_workspace_crates() {
        assert_eq!(default_filter("debug"), "debug,captain_engine=debug,sdk=debug");
    }

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        init_telemetry_with_level("warn");
        assert!(!init_telemetry_with_level("trace"));
    }
}
