// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Counters kept by each analyzer as packets are processed.

use core::ops::AddAssign;
use serde::Deserialize;
use serde::Serialize;

/// Packet counters of one flow's analyzer.
///
/// A flow's analyzer is only ever driven by one caller at a time, so
/// these are plain integers; totals across flows are built by adding
/// one set into another.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct IcmpStats {
    /// Every packet handed to the analyzer.
    pub pkts: u64,
    /// Packets dropped for failing the checksum.
    pub bad_checksums: u64,
    /// Packets too short to hold the common header.
    pub runts: u64,
    /// Events delivered.
    pub events: u64,

    pub pkts_orig: u64,
    pub bytes_orig: u64,
    pub pkts_resp: u64,
    pub bytes_resp: u64,
}

impl IcmpStats {
    /// Count a message accepted in the given direction.
    #[inline]
    pub fn hit(&mut self, is_orig: bool, len: u64) {
        let (pkts, bytes) = if is_orig {
            (&mut self.pkts_orig, &mut self.bytes_orig)
        } else {
            (&mut self.pkts_resp, &mut self.bytes_resp)
        };
        *pkts += 1;
        *bytes += len;
    }
}

impl AddAssign<&IcmpStats> for IcmpStats {
    fn add_assign(&mut self, rhs: &IcmpStats) {
        self.pkts += rhs.pkts;
        self.bad_checksums += rhs.bad_checksums;
        self.runts += rhs.runts;
        self.events += rhs.events;
        self.pkts_orig += rhs.pkts_orig;
        self.bytes_orig += rhs.bytes_orig;
        self.pkts_resp += rhs.pkts_resp;
        self.bytes_resp += rhs.bytes_resp;
    }
}
