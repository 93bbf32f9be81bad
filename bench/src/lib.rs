// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use criterion::measurement::Measurement;
use criterion::measurement::WallTime;
use icmp_analyzer::engine::icmp::v6::PACKET_TOO_BIG;
use icmp_test_utils::*;

/// Additional labelling information for [`Measurement`]s for
/// pretty-printing and grouping.
pub trait MeasurementInfo: Measurement {
    fn label() -> &'static str;
}

impl MeasurementInfo for WallTime {
    fn label() -> &'static str {
        "wallclock"
    }
}

/// A message to benchmark, named for display.
pub struct BenchPkt {
    pub name: &'static str,
    pub pkt: IcmpPkt,
}

const GUEST4: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
const REMOTE4: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 80);
const GUEST6: Ipv6Addr = Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 5);
const REMOTE6: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x80);

/// One message per handler, for both ICMP versions.
pub fn bench_pkts() -> Vec<BenchPkt> {
    let data = b"reunion\0";
    let udp = udp_hdr(40_000, 53, 0);
    let quoted4 = ipv4_datagram(GUEST4, REMOTE4, PROTO_UDP, &udp);
    let quoted6 = ipv6_datagram(GUEST6, REMOTE6, PROTO_UDP, &udp);

    vec![
        BenchPkt {
            name: "ICMPv4 echo",
            pkt: gen_icmpv4_echo(
                IcmpEchoType::Req,
                GUEST4,
                REMOTE4,
                7,
                777,
                data,
            ),
        },
        BenchPkt {
            name: "ICMPv4 unreachable",
            pkt: gen_icmpv4_unreach(REMOTE4, GUEST4, 3, &quoted4),
        },
        BenchPkt {
            name: "ICMPv6 echo",
            pkt: gen_icmpv6_echo(
                IcmpEchoType::Req,
                GUEST6,
                REMOTE6,
                7,
                777,
                data,
            ),
        },
        BenchPkt {
            name: "ICMPv6 packet too big",
            pkt: gen_icmpv6_error(REMOTE6, GUEST6, PACKET_TOO_BIG, 0, &quoted6),
        },
        BenchPkt {
            name: "ICMPv6 router advertisement",
            pkt: gen_router_advert(REMOTE6, 1800),
        },
    ]
}
