// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::event::EventMask;
use serde::Deserialize;
use serde::Serialize;

/// The default ICMP flow inactivity timeout, in seconds.
pub const ICMP_INACTIVITY_TIMEOUT_SECS: u64 = 60;

pub const FLOW_TABLE_DEF_MAX_ENTRIES: u32 = 8192;

/// Analyzer configuration, fixed at flow creation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct AnalyzerCfg {
    /// Skip checksum validation entirely.
    pub ignore_checksums: bool,

    /// Hand the bytes past the common header of every message to the
    /// raw contents recorder.
    pub packet_contents: bool,

    /// Seconds of silence after which the flow framework may tear an
    /// ICMP flow down.
    pub inactivity_timeout_secs: u64,

    /// The event kinds anybody is listening for.
    pub events: EventMask,
}

impl Default for AnalyzerCfg {
    fn default() -> Self {
        Self {
            ignore_checksums: false,
            packet_contents: false,
            inactivity_timeout_secs: ICMP_INACTIVITY_TIMEOUT_SECS,
            events: EventMask::all(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct FlowTableCfg {
    pub max_flows: u32,
}

impl Default for FlowTableCfg {
    fn default() -> Self {
        Self { max_flows: FLOW_TABLE_DEF_MAX_ENTRIES }
    }
}
