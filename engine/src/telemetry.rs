//! Telemetry and Observability
//!
//! Handles setting up `tracing-subscriber` for structured logging.
//! Supports config-driven log levels, environment variable overrides,
//! and format switching between pretty (debug) and JSON (release).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target for raw HTTP exchange logging (`--debug`)
pub const HTTP_LOG_TARGET: &str = "parley_engine::http";

/// Build the default filter directive string
///
/// With `debug_http` the HTTP target is always enabled at debug level,
/// whatever the general level is.
fn default_filter(log_level: &str, debug_http: bool) -> String {
    let mut filter = format!("{},parley_engine={}", log_level, log_level);
    if debug_http {
        filter.push_str(&format!(",{}=debug", HTTP_LOG_TARGET));
    }
    filter
}

/// Initialize the tracing subscriber with the given log level from config.
///
/// Priority: `RUST_LOG` env var > `log_level` parameter > default "info"
///
/// In debug builds: pretty-printed terminal output.
/// In release builds: JSON structured output with spans.
pub fn init_telemetry_with_level(log_level: &str, debug_http: bool) {
    let default_filter = default_filter(log_level, debug_http);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(debug_http))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .ok();
    }
}

/// Initialize the tracing subscriber with default settings.
///
/// Falls back to "info" level if no `RUST_LOG` env var is set.
/// Use `init_telemetry_with_level` when config is available.
pub fn init_telemetry() {
    init_telemetry_with_level("info", false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter("warn", false), "warn,parley_engine=warn");
        assert_eq!(
            default_filter("info", true),
            "info,parley_engine=info,parley_engine::http=debug"
        );
    }
}
