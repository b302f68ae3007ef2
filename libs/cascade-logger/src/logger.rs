use super::*;
use std::io::{stderr, stdout};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Installs the global subscriber with the build-dependent default level.
///
/// Safe to call more than once, later calls are ignored.
#[inline]
pub fn init_logger() {
    init_logger_with(if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    })
}

/// Installs the global subscriber, `CASCADE_LOG` takes precedence over `max_level`.
pub fn init_logger_with(max_level: Level) {
    let writer = stderr
        .with_max_level(Level::WARN)
        .or_else(stdout.with_max_level(max_level));

    let layer = tracing_subscriber::fmt::layer()
        .map_writer(move |_| writer)
        .map_event_format(|e| CascadeFormatter {
            default: e.with_timer(LogTime),
        });

    let result = match EnvFilter::try_from_env(LOG_FILTER_ENV) {
        Ok(env_filter) => tracing_subscriber::registry()
            .with(layer.with_filter(env_filter))
            .try_init(),
        Err(_) => tracing_subscriber::registry()
            .with(layer.with_filter(GeneralFilter::new(max_level)))
            .try_init(),
    };

    if result.is_ok() {
        trace!("logger initialized, max level {max_level}");
    }
}
