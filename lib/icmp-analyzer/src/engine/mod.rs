// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The ICMP analysis engine.

pub mod analyzer;
pub mod checksum;
pub mod conn;
pub mod context;
pub mod endpoint;
pub mod flow_table;
pub mod hooks;
pub mod icmp;
pub mod ip;
pub mod stat;
pub mod time;

pub use analyzer::AnalyzerError;
pub use analyzer::IcmpAnalyzer;
pub use conn::IcmpConn;
pub use hooks::AnalyzerHooks;
pub use hooks::MatchKind;
pub use hooks::NullHooks;
pub use hooks::RuleMatcher;
pub use ip::IpHdr;
