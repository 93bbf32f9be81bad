// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Logging to the terminal through slog.

use icmp_analyzer::provider::LogLevel;
use icmp_analyzer::provider::LogProvider;
use slog::Drain;
use slog::Level;
use slog::Logger;
use slog::o;

/// Build the root logger, writing to stderr at `level` and above.
pub fn term_logger(level: Level) -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = drain.filter_level(level).fuse();
    Logger::root(drain, o!())
}

/// Map the number of `-v` flags to a log level.
pub fn verbosity(count: u8) -> Level {
    match count {
        0 => Level::Warning,
        1 => Level::Info,
        2 => Level::Debug,
        _ => Level::Trace,
    }
}

/// Analyzer logging, routed to slog.
#[derive(Clone, Debug)]
pub struct SlogLog {
    log: Logger,
}

impl SlogLog {
    pub fn new(log: &Logger) -> Self {
        Self { log: log.new(o!("component" => "analyzer")) }
    }
}

impl LogProvider for SlogLog {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Note => slog::info!(self.log, "{}", msg),
            LogLevel::Warn => slog::warn!(self.log, "{}", msg),
            LogLevel::Error => slog::error!(self.log, "{}", msg),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn levels() {
        assert_eq!(verbosity(0), Level::Warning);
        assert_eq!(verbosity(2), Level::Debug);
        assert_eq!(verbosity(9), Level::Trace);
    }
}
