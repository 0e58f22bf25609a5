//! `log` backend that writes to the browser console

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "debug")]
const MAX_LEVEL: LevelFilter = LevelFilter::Debug;
#[cfg(not(feature = "debug"))]
const MAX_LEVEL: LevelFilter = LevelFilter::Info;

pub struct ConsoleLogger {
    level: LevelFilter,
}

static LOGGER: ConsoleLogger = ConsoleLogger { level: MAX_LEVEL };

/// Install the console logger. Later calls are no-ops.
pub fn init_logger() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LOGGER.level);
    }
}

impl ConsoleLogger {
    pub const fn new(level: LevelFilter) -> Self {
        Self { level }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}: {}", record.level(), record.target(), record.args());
        write_line(record.level(), &line);
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "wasm32")]
fn write_line(level: Level, line: &str) {
    use wasm_bindgen::JsValue;
    use web_sys::console;

    let value = JsValue::from_str(line);
    match level {
        Level::Error => console::error_1(&value),
        Level::Warn => console::warn_1(&value),
        Level::Info => console::info_1(&value),
        Level::Debug | Level::Trace => console::debug_1(&value),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn write_line(_level: Level, line: &str) {
    eprintln!("{}", line);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        let logger = ConsoleLogger::new(LevelFilter::Info);
        let warn = Metadata::builder().level(Level::Warn).target("pug").build();
        let debug = Metadata::builder().level(Level::Debug).target("pug").build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&debug));
    }
}
