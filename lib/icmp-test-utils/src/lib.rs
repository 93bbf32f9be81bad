// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Common routines for building ICMP traffic in tests, benchmarks and
//! fuzzing.

pub mod icmp;
pub mod pcap;

pub use icmp::*;
pub use icmp_analyzer::api::*;
pub use icmp_analyzer::engine::IpHdr;
pub use std::net::IpAddr;
pub use std::net::Ipv4Addr;
pub use std::net::Ipv6Addr;
