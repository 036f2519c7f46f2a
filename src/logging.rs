//! Logging setup: terminal output plus a persistent run log
//!
//! The file log keeps a trail for unattended scheduled runs; it gets
//! everything at debug level while the terminal stays at info.

use std::fs::OpenOptions;

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

pub const LOG_FILE: &str = "daily_bible.log";

/// Install the combined terminal and file logger. A log file that
/// cannot be opened downgrades to terminal-only logging.
pub fn init() {
    let mut builder = ConfigBuilder::new();
    builder.set_time_format_rfc3339();
    // Local offset is unavailable in some environments; UTC is fine then.
    let _ = builder.set_time_offset_to_local();
    let config = builder.build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Info,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    match OpenOptions::new().create(true).append(true).open(LOG_FILE) {
        Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, config, file)),
        Err(err) => eprintln!(
            "could not open {}: {}, logging to terminal only",
            LOG_FILE, err
        ),
    }

    if let Err(err) = CombinedLogger::init(loggers) {
        eprintln!("logger already initialized: {}", err);
    }
}
