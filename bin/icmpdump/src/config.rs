// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The icmpdump configuration file.
//!
//! ```toml
//! [analyzer]
//! ignore_checksums = false
//! packet_contents = false
//! inactivity_timeout_secs = 60
//! # The event kinds to raise, see `EventMask`.
//! events = "ECHO_REQUEST | ECHO_REPLY | UNREACHABLE"
//!
//! [flow_table]
//! max_flows = 8192
//! ```
//!
//! Every key is optional.

use anyhow::Context;
use icmp_analyzer::api::AnalyzerCfg;
use icmp_analyzer::api::FlowTableCfg;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub analyzer: AnalyzerCfg,
    pub flow_table: FlowTableCfg,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}
