// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Providers allow the analyzer to work in different contexts by
//! letting the host plug in implementations of core services. Right
//! now that is only logging: tests discard it with [`NullLog`], the
//! `icmpdump` tool maps it to slog. If a service doesn't have at
//! least two obvious implementations, it probably doesn't need to be
//! a provider.

use core::fmt;
use core::fmt::Display;
use std::sync::Arc;

/// The set of all host-specific providers required by an analyzer.
///
/// Every flow's analyzer holds a clone; the providers themselves are
/// shared.
#[derive(Clone)]
pub struct Providers {
    pub log: Arc<dyn LogProvider>,
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}

/// A logging provider provides the means to log messages to some
/// destination based on the context in which the analyzer is running.
///
/// Logging levels are provided by [`LogLevel`]. These levels will map
/// to the underlying provider with varying degrees of success.
pub trait LogProvider: Send + Sync {
    /// Log a message at the specified level.
    fn log(&self, level: LogLevel, msg: &str);
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    Note,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level_s = match self {
            Self::Note => "[NOTE]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        };
        write!(f, "{level_s}")
    }
}

/// Discard everything.
#[derive(Clone, Copy, Debug)]
pub struct NullLog;

impl LogProvider for NullLog {
    fn log(&self, _level: LogLevel, _msg: &str) {}
}

impl Providers {
    pub fn new(log: Arc<dyn LogProvider>) -> Self {
        Self { log }
    }

    pub fn null() -> Self {
        Self { log: Arc::new(NullLog) }
    }
}
