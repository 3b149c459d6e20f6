//! Helpers to create and install the logger behind the `log` facade.
//!
//! The level comes from the command line; `RUST_LOG` directives, when set,
//! refine it per module.
//!
//! # Examples
//!
//! ```no_run
//! use peripherals::logger::{create_logger, init, level_from_verbosity};
//! use log::info;
//!
//! let logger = create_logger(level_from_verbosity(2));
//! init(logger).unwrap();
//!
//! info!("Hello world");
//! ```

use std::env;

use env_logger::{Builder, Logger};
use log::SetLoggerError;

pub use log::LevelFilter;

/// Map the count of `-v` flags to a level, warnings are always shown
pub fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub fn create_logger(level: LevelFilter) -> Logger {
    let mut builder = Builder::new();
    builder.filter_level(level).format_timestamp_millis();
    if let Ok(directives) = env::var("RUST_LOG") {
        builder.parse_filters(&directives);
    }
    builder.build()
}

/// Install logger for the log facade
///
/// Fails when a logger has already been installed.
pub fn init(logger: Logger) -> Result<(), SetLoggerError> {
    let level = logger.filter();
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);
    Ok(())
}
