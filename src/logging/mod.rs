//! Logging: system log forwarding and tracing setup
//!
//! - **forwarder**: `log(level, message)` to the platform system log, with
//!   splitting of long messages
//! - **layer**: `tracing` layer feeding the forwarder

pub mod forwarder;
pub mod layer;

pub use forwarder::{
    init_system_log, log, split_message, LogSink, PlatformSink, Severity, SystemLogger,
    MAX_ENTRY_LEN, SEGMENT_LEN,
};
pub use layer::SyslogLayer;

use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::ProbeConfig;

/// Filter for the given verbosity: `RUST_LOG` or the configured level at 0,
/// `debug` at 1, `trace` above.
pub fn env_filter(config: &ProbeConfig, verbosity: u8) -> EnvFilter {
    match verbosity {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Install the global subscriber: stderr formatter plus, when enabled, the
/// system log layer.
pub fn init_tracing(
    config: &ProbeConfig,
    verbosity: u8,
    force_syslog: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let syslog = if config.syslog.enabled || force_syslog {
        let min_level: Level = config
            .syslog
            .min_level
            .parse()
            .map_err(|e| format!("invalid syslog.min_level '{}': {}", config.syslog.min_level, e))?;
        Some(SyslogLayer::platform(&config.syslog.ident, min_level))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter(config, verbosity))
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(syslog)
        .try_init()?;

    Ok(())
}
