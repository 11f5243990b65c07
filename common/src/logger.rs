//! Logging init, combining a colored terminal logger with an optional file
//! logger, both driven by one call from `main`.

use std::fs::OpenOptions;

use log::LevelFilter;
use simplelog::{
    format_description, ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

/// Initializes the global logger. `filename`, when given, also appends
/// every record to that file alongside the terminal output.
pub fn init(level: LevelFilter, filename: Option<&str>) -> anyhow::Result<()> {
    let config = ConfigBuilder::new()
        .set_time_format_custom(format_description!(
            "[month]-[day] [hour]:[minute]:[second]"
        ))
        .set_thread_level(LevelFilter::Error)
        .set_location_level(LevelFilter::Error)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(filename) = filename {
        loggers.push(WriteLogger::new(
            level,
            config,
            OpenOptions::new().create(true).write(true).append(true).open(filename)?,
        ));
    }

    CombinedLogger::init(loggers)?;
    Ok(())
}
