// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Moments on the capture clock.
//!
//! Flows age by the timestamps of the packets they see, not by the
//! wall clock of the host replaying them, so a `Moment` is just a
//! count of microseconds since the epoch of whatever captured the
//! traffic.

use core::fmt;
use core::fmt::Display;
use core::ops::Add;
use core::time::Duration;
use serde::Deserialize;
use serde::Serialize;

/// The number of milliseconds in a second.
pub const MILLIS: u64 = 1_000;
/// The number of microseconds in a second.
pub const MICROS: u64 = 1_000_000;

/// A moment in time.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Moment {
    micros: u64,
}

impl Add<Duration> for Moment {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let delta = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Moment { micros: self.micros.saturating_add(delta) }
    }
}

impl Moment {
    pub const fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    /// A moment from a pcap-style `(seconds, microseconds)` timestamp.
    pub const fn from_timeval(secs: u32, usecs: u32) -> Self {
        Self { micros: secs as u64 * MICROS + usecs as u64 }
    }

    pub fn raw_micros(&self) -> u64 {
        self.micros
    }

    /// Compute the delta between `self - earlier` and return as
    /// milliseconds. A moment before `earlier` yields zero.
    pub fn delta_as_millis(&self, earlier: Moment) -> u64 {
        self.micros.saturating_sub(earlier.micros) / MILLIS
    }
}

impl Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:06}", self.micros / MICROS, self.micros % MICROS)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let t0 = Moment::from_timeval(1_700_000_000, 250_000);
        let t1 = t0 + Duration::from_millis(1_500);
        assert_eq!(t1.delta_as_millis(t0), 1_500);
        assert_eq!(t0.delta_as_millis(t1), 0);
        assert_eq!(t1.to_string(), "1700000001.750000");
    }
}
