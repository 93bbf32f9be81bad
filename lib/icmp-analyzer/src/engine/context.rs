// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Decode the datagram quoted inside an ICMP error message.
//!
//! An error message carries as much of the offending datagram as the
//! sender could fit, which is often not much. Nothing here fails:
//! whatever can't be read is reported through the flag fields of the
//! [`ContextRecord`].

use super::icmp;
use super::ip::v4;
use super::ip::v4::Ipv4HdrRaw;
use super::ip::v6;
use super::ip::v6::Ipv6HdrRaw;
use crate::api::ConnId;
use crate::api::ContextRecord;
use crate::api::IcmpVersion;
use crate::api::Protocol;
use crate::api::TransportProto;
use std::net::IpAddr;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

/// Bytes of transport header needed to fill in the ports: two 16-bit
/// port-equivalent fields.
pub const ULP_PORTS_LEN: usize = 4;

/// The first four bytes of a TCP or UDP header.
#[repr(C)]
#[derive(Clone, Debug, FromBytes, KnownLayout, Immutable, Unaligned)]
struct UlpPortsRaw {
    src_port: [u8; 2],
    dst_port: [u8; 2],
}

/// The transport view of a quoted datagram.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UlpPorts {
    pub proto: TransportProto,
    pub src_port: u16,
    pub dst_port: u16,
    /// For quoted ICMP: the quoted message has no reply.
    pub one_way: bool,
}

/// Classify the quoted transport protocol and pull out its ports.
///
/// For a quoted ICMP message the "ports" are its type and counterpart
/// type, looked up in the table of the ICMP version the protocol
/// number names. Anything but TCP, UDP and ICMP has no ports.
///
/// `ulp` must hold at least [`ULP_PORTS_LEN`] bytes; when it doesn't,
/// the protocol is still classified but the ports are left at zero.
pub fn context_protocol(next_proto: Protocol, ulp: &[u8]) -> UlpPorts {
    match next_proto {
        Protocol::ICMP => quoted_icmp(IcmpVersion::V4, ulp),
        Protocol::ICMPv6 => quoted_icmp(IcmpVersion::V6, ulp),
        Protocol::TCP => quoted_ports(TransportProto::Tcp, ulp),
        Protocol::UDP => quoted_ports(TransportProto::Udp, ulp),
        _ => UlpPorts::default(),
    }
}

fn quoted_icmp(vsn: IcmpVersion, ulp: &[u8]) -> UlpPorts {
    let mut ports = UlpPorts { proto: vsn.transport(), ..Default::default() };

    // Type and code are all we need, which is less than the four
    // bytes guaranteed to be there.
    if let [ty, code, ..] = ulp {
        let cp = icmp::counterpart(vsn, *ty, *code);
        ports.src_port = u16::from(*ty);
        ports.dst_port = u16::from(cp.ty);
        ports.one_way = cp.one_way;
    }

    ports
}

fn quoted_ports(proto: TransportProto, ulp: &[u8]) -> UlpPorts {
    let mut ports = UlpPorts { proto, ..Default::default() };

    if let Ok((raw, _)) = UlpPortsRaw::ref_from_prefix(ulp) {
        ports.src_port = u16::from_be_bytes(raw.src_port);
        ports.dst_port = u16::from_be_bytes(raw.dst_port);
    }

    ports
}

/// Build the context record for an ICMPv4 error from the captured
/// bytes following the common header.
pub fn extract_v4(data: &[u8]) -> ContextRecord {
    let Ok((hdr, _)) = Ipv4HdrRaw::ref_from_prefix(data) else {
        return ContextRecord::bad_header(false);
    };

    let hdr_len = hdr.hdr_len();
    if hdr_len < Ipv4HdrRaw::BASE_SIZE || hdr_len > data.len() {
        return ContextRecord::bad_header(false);
    }

    let src = IpAddr::V4(hdr.src());
    let dst = IpAddr::V4(hdr.dst());
    let mut rec = ContextRecord {
        id: ConnId {
            src,
            src_port: 0,
            dst,
            dst_port: 0,
            proto: TransportProto::Unknown,
        },
        len: u32::from(hdr.total_len()),
        proto: TransportProto::Unknown,
        bad_hdr_len: false,
        bad_checksum: !v4::hdr_csum_ok(&data[..hdr_len]),
        frag_offset: u32::from(hdr.frag_offset()),
        mf: hdr.mf(),
        df: hdr.df(),
    };

    let ulp = &data[hdr_len..];
    if ulp.len() < ULP_PORTS_LEN {
        // The header is intact, but the ports didn't make it.
        rec.bad_hdr_len = true;
        return rec;
    }

    let ports = context_protocol(hdr.proto(), ulp);
    rec.id.src_port = ports.src_port;
    rec.id.dst_port = ports.dst_port;
    rec.id.proto = ports.proto;
    rec.proto = ports.proto;
    rec
}

/// Build the context record for an ICMPv6 error from the captured
/// bytes following the common header.
///
/// Only a bare 40-byte header is understood: a quoted header followed
/// by extension headers counts as a bad header length, as does one
/// that was cut short. There are no fragmentation fields to report,
/// so the datagram always reads as unfragmented with DF set.
pub fn extract_v6(data: &[u8]) -> ContextRecord {
    let Ok((hdr, rest)) = Ipv6HdrRaw::ref_from_prefix(data) else {
        return ContextRecord::bad_header(true);
    };

    match v6::walk_ext_hdrs(hdr.next_hdr(), rest) {
        Some((0, _)) => (),
        _ => return ContextRecord::bad_header(true),
    }

    let next_proto = Protocol::from(hdr.next_hdr());
    let mut rec = ContextRecord {
        id: ConnId {
            src: IpAddr::V6(hdr.src()),
            src_port: 0,
            dst: IpAddr::V6(hdr.dst()),
            dst_port: 0,
            proto: TransportProto::Unknown,
        },
        len: (Ipv6HdrRaw::BASE_SIZE as u32) + u32::from(hdr.payload_len()),
        proto: TransportProto::Unknown,
        bad_hdr_len: false,
        bad_checksum: false,
        frag_offset: 0,
        mf: false,
        df: true,
    };

    if rest.len() < ULP_PORTS_LEN {
        rec.bad_hdr_len = true;
    } else {
        let ports = context_protocol(next_proto, rest);
        rec.id.src_port = ports.src_port;
        rec.id.dst_port = ports.dst_port;
        rec.id.proto = ports.proto;
        rec.proto = ports.proto;
    }

    // A quoted ICMPv6 message is tagged as such even when its ports
    // were cut off.
    if next_proto == Protocol::ICMPv6 {
        rec.proto = TransportProto::Icmpv6;
    }

    rec
}

/// Extract the context for the given ICMP version.
pub fn extract(vsn: IcmpVersion, data: &[u8]) -> ContextRecord {
    match vsn {
        IcmpVersion::V4 => extract_v4(data),
        IcmpVersion::V6 => extract_v6(data),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::checksum::Checksum;
    use crate::engine::checksum::HeaderChecksum;
    use std::net::Ipv4Addr;
    use std::net::Ipv6Addr;

    fn quoted_v4(proto: u8, ulp: &[u8]) -> Vec<u8> {
        let total = (20 + ulp.len() + 64) as u16;
        let mut hdr = vec![
            0x45, 0x00, 0, 0, 0x12, 0x34, 0x40, 0x00, 64, proto, 0, 0, 10, 0,
            0, 1, 10, 0, 0, 2,
        ];
        hdr[2..4].copy_from_slice(&total.to_be_bytes());
        let csum = HeaderChecksum::from(Checksum::compute(&hdr));
        hdr[10..12].copy_from_slice(&csum.bytes());
        hdr.extend_from_slice(ulp);
        hdr
    }

    fn quoted_v6(next_hdr: u8, ulp: &[u8]) -> Vec<u8> {
        let mut hdr = vec![0x60, 0, 0, 0, 0, 0, next_hdr, 64];
        hdr[4..6].copy_from_slice(&(ulp.len() as u16 + 32).to_be_bytes());
        hdr.extend_from_slice(&"fd00::1".parse::<Ipv6Addr>().unwrap().octets());
        hdr.extend_from_slice(&"fd00::2".parse::<Ipv6Addr>().unwrap().octets());
        hdr.extend_from_slice(ulp);
        hdr
    }

    #[test]
    fn v4_udp_ports() {
        let data = quoted_v4(17, &[0, 53, 0x30, 0x39, 0, 8, 0, 0]);
        let rec = extract_v4(&data);
        assert!(!rec.bad_hdr_len);
        assert!(!rec.bad_checksum);
        assert_eq!(rec.proto, TransportProto::Udp);
        assert_eq!(rec.id.src_port, 53);
        assert_eq!(rec.id.dst_port, 12345);
        assert_eq!(rec.id.src, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(rec.id.dst, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(rec.len, 92);
        assert!(rec.df);
        assert!(!rec.mf);
        assert_eq!(rec.frag_offset, 0);
    }

    #[test]
    fn v4_bad_checksum_flagged() {
        let mut data = quoted_v4(6, &[0x1f, 0x90, 0xc0, 0x00]);
        data[8] = 1;
        let rec = extract_v4(&data);
        assert!(rec.bad_checksum);
        assert!(!rec.bad_hdr_len);
        assert_eq!(rec.proto, TransportProto::Tcp);
        assert_eq!((rec.id.src_port, rec.id.dst_port), (8080, 0xc000));
    }

    #[test]
    fn v4_short_header() {
        let data = quoted_v4(17, &[]);
        for cut in [0, 1, 19] {
            let rec = extract_v4(&data[..cut]);
            assert_eq!(rec, ContextRecord::bad_header(false));
        }

        // IHL claims options that weren't captured.
        let mut data = quoted_v4(17, &[0, 53, 0x30, 0x39]);
        data[0] = 0x47;
        assert_eq!(extract_v4(&data), ContextRecord::bad_header(false));

        // IHL below the minimum.
        data[0] = 0x44;
        assert_eq!(extract_v4(&data), ContextRecord::bad_header(false));
    }

    #[test]
    fn v4_ports_cut_off() {
        let data = quoted_v4(17, &[0, 53, 0x30]);
        let rec = extract_v4(&data);
        assert!(rec.bad_hdr_len);
        assert!(!rec.bad_checksum);
        assert_eq!(rec.proto, TransportProto::Unknown);
        assert_eq!((rec.id.src_port, rec.id.dst_port), (0, 0));
        // The header itself was still read.
        assert_eq!(rec.id.src, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(rec.df);
    }

    #[test]
    fn v4_quoted_icmp_uses_counterpart() {
        let data = quoted_v4(1, &[8, 0, 0xf7, 0xff, 0, 0, 0, 0]);
        let rec = extract_v4(&data);
        assert_eq!(rec.proto, TransportProto::Icmp);
        assert_eq!((rec.id.src_port, rec.id.dst_port), (8, 0));

        // A one-way type reports its code.
        let data = quoted_v4(1, &[3, 1, 0, 0]);
        let rec = extract_v4(&data);
        assert_eq!((rec.id.src_port, rec.id.dst_port), (3, 1));
    }

    #[test]
    fn v4_unknown_protocol() {
        let data = quoted_v4(47, &[1, 2, 3, 4]);
        let rec = extract_v4(&data);
        assert!(!rec.bad_hdr_len);
        assert_eq!(rec.proto, TransportProto::Unknown);
        assert_eq!((rec.id.src_port, rec.id.dst_port), (0, 0));
    }

    #[test]
    fn v4_fragment_fields() {
        let mut data = quoted_v4(17, &[0, 53, 0x30, 0x39]);
        data[6..8].copy_from_slice(&[0x20, 0xb9]);
        let rec = extract_v4(&data);
        assert!(rec.mf);
        assert!(!rec.df);
        assert_eq!(rec.frag_offset, 0xb9);
        // The flags moved without fixing the checksum.
        assert!(rec.bad_checksum);
    }

    #[test]
    fn v6_udp_ports() {
        let data = quoted_v6(17, &[0, 53, 0x30, 0x39]);
        let rec = extract_v6(&data);
        assert!(!rec.bad_hdr_len);
        assert!(!rec.bad_checksum);
        assert!(!rec.mf);
        assert!(rec.df);
        assert_eq!(rec.proto, TransportProto::Udp);
        assert_eq!((rec.id.src_port, rec.id.dst_port), (53, 12345));
        assert_eq!(rec.len, 40 + 36);
    }

    #[test]
    fn v6_quoted_icmpv6() {
        let data = quoted_v6(58, &[128, 0, 0, 0, 0, 1, 0, 1]);
        let rec = extract_v6(&data);
        assert_eq!(rec.proto, TransportProto::Icmpv6);
        assert_eq!(rec.id.proto, TransportProto::Icmpv6);
        assert_eq!((rec.id.src_port, rec.id.dst_port), (128, 129));

        // Forced even without the ports.
        let rec = extract_v6(&data[..42]);
        assert!(rec.bad_hdr_len);
        assert_eq!(rec.proto, TransportProto::Icmpv6);
        assert_eq!((rec.id.src_port, rec.id.dst_port), (0, 0));
    }

    #[test]
    fn v6_header_not_40_bytes() {
        // Hop-by-hop options ahead of UDP.
        let mut ulp = vec![17, 0, 0, 0, 0, 0, 0, 0];
        ulp.extend_from_slice(&[0, 53, 0x30, 0x39]);
        let data = quoted_v6(0, &ulp);
        assert_eq!(extract_v6(&data), ContextRecord::bad_header(true));

        let data = quoted_v6(17, &[0, 53, 0x30, 0x39]);
        assert_eq!(extract_v6(&data[..39]), ContextRecord::bad_header(true));

        let rec = ContextRecord::bad_header(true);
        assert_eq!(rec.id.src, IpAddr::V6(Ipv6Addr::UNSPECIFIED));
        assert_eq!(rec.len, 0);
        assert!(rec.df);
    }
}
