// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use icmp_analyzer::api::AnalyzerCfg;
use icmp_analyzer::api::IcmpVersion;
use icmp_analyzer::engine::IcmpAnalyzer;
use icmp_analyzer::engine::IpHdr;
use icmp_analyzer::engine::NullHooks;
use icmp_analyzer::engine::icmp;
use icmp_analyzer::provider::Providers;
use icmp_bench::MeasurementInfo;
use icmp_bench::bench_pkts;
use std::hint::black_box;

// Time to process one message on an established flow, events
// included.
pub fn deliver_packet<M: MeasurementInfo + 'static>(c: &mut Criterion<M>) {
    let mut c = c.benchmark_group(M::label());

    for bp in bench_pkts() {
        let pkt = &bp.pkt;
        let vsn = match pkt.ip() {
            IpHdr::V4(_) => IcmpVersion::V4,
            IpHdr::V6(_) => IcmpVersion::V6,
        };
        let (ip, msg) = (pkt.ip(), pkt.msg());
        let id = icmp::conn_id(vsn, ip.src(), ip.dst(), msg[0], msg[1]);
        let mut a = IcmpAnalyzer::new(
            id,
            AnalyzerCfg::default(),
            Providers::null(),
            None,
        );

        c.bench_function(bp.name, |b| {
            b.iter(|| {
                a.deliver_packet(
                    msg.len(),
                    black_box(msg),
                    true,
                    0,
                    ip,
                    &mut NullHooks,
                )
            })
        });
    }
}

// Parsing the outer header on the way in.
pub fn parse_ip<M: MeasurementInfo + 'static>(c: &mut Criterion<M>) {
    let mut c = c.benchmark_group(M::label());

    for bp in bench_pkts() {
        let datagram = bp.pkt.datagram();
        c.bench_function(&format!("parse {}", bp.name), |b| {
            b.iter(|| IpHdr::parse(black_box(datagram)).map(|(ip, _)| ip))
        });
    }
}

criterion_group!(wallclock, deliver_packet, parse_ip);
criterion_main!(wallclock);
