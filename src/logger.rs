//! Secure Console Logger
//!
//! Backend for the [`log`] facade that writes one line per record to the
//! secure console UART.
//!
//! # Line Format
//! ```text
//! [E tee_dispatcher::dispatch::handler] input arguments overflow: received 12, permitted 10
//! ```

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::drivers::uart::UART;

/// Logger writing to [`UART`]
pub struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Install the console logger.
///
/// Fails if a logger is already installed. The console UART must be
/// initialized separately; records logged before that are dropped.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Single-letter tag for a level
fn level_tag(level: log::Level) -> char {
    match level {
        log::Level::Error => 'E',
        log::Level::Warn => 'W',
        log::Level::Info => 'I',
        log::Level::Debug => 'D',
        log::Level::Trace => 'V',
    }
}

/// Format one record as a console line.
pub fn write_record<W: Write>(out: &mut W, record: &Record<'_>) -> fmt::Result {
    writeln!(
        out,
        "[{} {}] {}",
        level_tag(record.level()),
        record.target(),
        record.args()
    )
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut uart = UART.lock();
        let _ = write_record(&mut *uart, record);
    }

    fn flush(&self) {}
}
