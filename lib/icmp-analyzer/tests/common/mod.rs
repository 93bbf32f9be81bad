// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than its worth here.
#![allow(dead_code)]

pub use icmp_analyzer::engine::AnalyzerHooks;
pub use icmp_analyzer::engine::IcmpAnalyzer;
pub use icmp_analyzer::engine::icmp;
pub use icmp_analyzer::engine::icmp::v4;
pub use icmp_analyzer::engine::icmp::v6;
pub use icmp_analyzer::provider::Providers;
pub use icmp_test_utils::*;

/// Hooks that keep everything the analyzer hands them.
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<IcmpEvent>,
    pub weirds: Vec<&'static str>,
    pub contents: Vec<Vec<u8>>,
    pub forwarded: Vec<(usize, Vec<u8>, bool, u64)>,
}

impl AnalyzerHooks for Recorder {
    fn deliver(&mut self, event: IcmpEvent) {
        self.events.push(event);
    }

    fn weird(&mut self, name: &'static str) {
        self.weirds.push(name);
    }

    fn packet_contents(&mut self, bytes: &[u8]) {
        self.contents.push(bytes.to_vec());
    }

    fn forward_packet(
        &mut self,
        len: usize,
        data: &[u8],
        is_orig: bool,
        seq: u64,
        _ip: &IpHdr,
    ) {
        self.forwarded.push((len, data.to_vec(), is_orig, seq));
    }
}

/// The flow identity the first message of `pkt` would create.
pub fn flow_of(pkt: &IcmpPkt) -> ConnId {
    let vsn = match pkt.ip() {
        IpHdr::V4(_) => IcmpVersion::V4,
        IpHdr::V6(_) => IcmpVersion::V6,
    };
    let msg = pkt.msg();
    icmp::conn_id(vsn, pkt.ip().src(), pkt.ip().dst(), msg[0], msg[1])
}

/// An analyzer for the flow started by `pkt`.
pub fn analyzer_for(pkt: &IcmpPkt, cfg: AnalyzerCfg) -> IcmpAnalyzer {
    IcmpAnalyzer::new(flow_of(pkt), cfg, Providers::null(), None)
}

/// Deliver `pkt` whole, as captured.
pub fn deliver(
    a: &mut IcmpAnalyzer,
    pkt: &IcmpPkt,
    is_orig: bool,
    rec: &mut Recorder,
) {
    a.deliver_packet(pkt.len(), pkt.msg(), is_orig, 0, pkt.ip(), rec)
        .unwrap();
}

/// Deliver `pkt` to a fresh analyzer and return what it raised.
pub fn run_one(pkt: &IcmpPkt) -> Recorder {
    let mut a = analyzer_for(pkt, AnalyzerCfg::default());
    let mut rec = Recorder::default();
    deliver(&mut a, pkt, true, &mut rec);
    rec
}
