//! Logging initialization
//!
//! Installs a `tracing` subscriber writing to stderr, as text or as
//! newline-delimited JSON. `RUST_LOG` takes precedence over the configured
//! level.

use tracing_subscriber::EnvFilter;

use crate::cli::VerbosityLevel;
use crate::config::LoggingConfig;

/// Directive used when `RUST_LOG` is not set
pub fn default_directive(config: &LoggingConfig, verbosity: VerbosityLevel) -> String {
    match (verbosity, config.level.as_str()) {
        (VerbosityLevel::Verbose, "info" | "warn" | "error") => "debug".to_string(),
        (_, level) => level.to_string(),
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// leave the first subscriber in place.
pub fn init_logging(config: &LoggingConfig, verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config, verbosity)));

    if config.json {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
