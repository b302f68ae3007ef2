mod filter;
mod formatter;
mod logger;

pub use logger::{init_logger, init_logger_with};
pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, instrument, log::LevelFilter, trace,
    trace_span, warn, warn_span, Instrument, Level,
};

use filter::GeneralFilter;
use formatter::{CascadeFormatter, LogTime};

/// Environment variable holding an `EnvFilter` directive, e.g. `cascade_core=trace`.
pub const LOG_FILTER_ENV: &str = "CASCADE_LOG";
/// Forces coloured output in release builds when set.
pub const COLORFUL_LOGS_ENV: &str = "CASCADE_COLORFUL_LOGS";
