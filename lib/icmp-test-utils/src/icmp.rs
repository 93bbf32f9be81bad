// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Routines for ICMP testing.

use icmp_analyzer::api::PROTO_ICMP;
use icmp_analyzer::api::PROTO_ICMPV6;
use icmp_analyzer::engine::IpHdr;
use icmp_analyzer::engine::checksum::Checksum;
use icmp_analyzer::engine::checksum::HeaderChecksum;
use icmp_analyzer::engine::icmp::v4;
use icmp_analyzer::engine::icmp::v6;
use smoltcp::phy::ChecksumCapabilities as CsumCapab;
use smoltcp::wire::EthernetAddress;
use smoltcp::wire::EthernetFrame;
use smoltcp::wire::EthernetProtocol;
use smoltcp::wire::EthernetRepr;
use smoltcp::wire::Icmpv4Packet;
use smoltcp::wire::Icmpv4Repr;
use smoltcp::wire::Icmpv6Packet;
use smoltcp::wire::Icmpv6Repr;
use smoltcp::wire::IpAddress;
use smoltcp::wire::Ipv6Address;
pub use smoltcp::wire::NdiscRepr;
pub use smoltcp::wire::RawHardwareAddress;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

pub const GW_MAC: [u8; 6] = [0xA8, 0x40, 0x25, 0xFF, 0x77, 0x77];
pub const GUEST_MAC: [u8; 6] = [0xA8, 0x40, 0x25, 0xF7, 0x00, 0x01];

/// The smallest Ethernet frame, FCS excluded.
pub const ETHER_MIN_LEN: usize = 60;

/// An IP datagram carrying an ICMP message, along with its decoded
/// outer header.
#[derive(Clone, Debug)]
pub struct IcmpPkt {
    datagram: Vec<u8>,
    ip: IpHdr,
}

impl IcmpPkt {
    /// Wrap a complete IP datagram.
    pub fn from_datagram(datagram: Vec<u8>) -> Self {
        let (ip, _) = match IpHdr::parse(&datagram) {
            Ok(v) => v,
            Err(e) => panic!("bad test datagram: {e}"),
        };
        Self { datagram, ip }
    }

    pub fn ip(&self) -> &IpHdr {
        &self.ip
    }

    pub fn datagram(&self) -> &[u8] {
        &self.datagram
    }

    /// The ICMP message: everything past the outer header.
    pub fn msg(&self) -> &[u8] {
        &self.datagram[self.ip.hdr_len()..]
    }

    pub fn msg_mut(&mut self) -> &mut [u8] {
        let off = self.ip.hdr_len();
        &mut self.datagram[off..]
    }

    /// Length of the ICMP message.
    pub fn len(&self) -> usize {
        self.msg().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flip every bit of the message byte at `off`.
    pub fn corrupt(&mut self, off: usize) {
        self.msg_mut()[off] ^= 0xFF;
    }

    /// Frame the datagram for Ethernet, padding it to the minimum
    /// frame size.
    pub fn eth_frame(&self) -> Vec<u8> {
        eth_frame(&self.datagram)
    }
}

pub enum IcmpEchoType {
    Req,
    Reply,
}

/// Build an IPv4 datagram with a valid header checksum.
pub fn ipv4_datagram(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    proto: u8,
    payload: &[u8],
) -> Vec<u8> {
    let total_len = (20 + payload.len()) as u16;
    let mut pkt = vec![0x45, 0x00];
    pkt.extend_from_slice(&total_len.to_be_bytes());
    // Identification, DF, TTL.
    pkt.extend_from_slice(&[0x00, 0x01, 0x40, 0x00, 64, proto, 0, 0]);
    pkt.extend_from_slice(&src.octets());
    pkt.extend_from_slice(&dst.octets());
    let csum = HeaderChecksum::from(Checksum::compute(&pkt));
    pkt[10..12].copy_from_slice(&csum.bytes());
    pkt.extend_from_slice(payload);
    pkt
}

/// Build an IPv6 datagram.
pub fn ipv6_datagram(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    next_hdr: u8,
    payload: &[u8],
) -> Vec<u8> {
    let mut pkt = vec![0x60, 0, 0, 0];
    pkt.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    pkt.extend_from_slice(&[next_hdr, 64]);
    pkt.extend_from_slice(&src.octets());
    pkt.extend_from_slice(&dst.octets());
    pkt.extend_from_slice(payload);
    pkt
}

/// A UDP header for `payload_len` bytes of data, checksum unset.
pub fn udp_hdr(src_port: u16, dst_port: u16, payload_len: usize) -> Vec<u8> {
    let mut hdr = Vec::with_capacity(8);
    hdr.extend_from_slice(&src_port.to_be_bytes());
    hdr.extend_from_slice(&dst_port.to_be_bytes());
    hdr.extend_from_slice(&((8 + payload_len) as u16).to_be_bytes());
    hdr.extend_from_slice(&[0, 0]);
    hdr
}

/// The first eight bytes of a TCP header: all an ICMP error is
/// required to quote.
pub fn tcp_hdr_prefix(src_port: u16, dst_port: u16, seq: u32) -> Vec<u8> {
    let mut hdr = Vec::with_capacity(8);
    hdr.extend_from_slice(&src_port.to_be_bytes());
    hdr.extend_from_slice(&dst_port.to_be_bytes());
    hdr.extend_from_slice(&seq.to_be_bytes());
    hdr
}

/// Build an ICMPv4 message with a valid checksum.
pub fn icmpv4_msg(ty: u8, code: u8, rest: [u8; 4], body: &[u8]) -> Vec<u8> {
    let mut msg = vec![ty, code, 0, 0];
    msg.extend_from_slice(&rest);
    msg.extend_from_slice(body);
    let csum = HeaderChecksum::from(Checksum::compute(&msg));
    msg[2..4].copy_from_slice(&csum.bytes());
    msg
}

/// Build an ICMPv6 message with a valid checksum for the given
/// addresses.
pub fn icmpv6_msg(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    ty: u8,
    code: u8,
    rest: [u8; 4],
    body: &[u8],
) -> Vec<u8> {
    let mut msg = vec![ty, code, 0, 0];
    msg.extend_from_slice(&rest);
    msg.extend_from_slice(body);

    let mut csum = Checksum::new();
    csum.add_bytes(&src.octets());
    csum.add_bytes(&dst.octets());
    csum.add_bytes(&(msg.len() as u32).to_be_bytes());
    csum.add_bytes(&[0, 0, 0, PROTO_ICMPV6]);
    csum.add_bytes(&msg);
    let csum = HeaderChecksum::from(csum);
    msg[2..4].copy_from_slice(&csum.bytes());
    msg
}

pub fn gen_icmpv4(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    ty: u8,
    code: u8,
    rest: [u8; 4],
    body: &[u8],
) -> IcmpPkt {
    let msg = icmpv4_msg(ty, code, rest, body);
    IcmpPkt::from_datagram(ipv4_datagram(src, dst, PROTO_ICMP, &msg))
}

pub fn gen_icmpv6(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    ty: u8,
    code: u8,
    rest: [u8; 4],
    body: &[u8],
) -> IcmpPkt {
    let msg = icmpv6_msg(src, dst, ty, code, rest, body);
    IcmpPkt::from_datagram(ipv6_datagram(src, dst, PROTO_ICMPV6, &msg))
}

pub fn gen_icmp_echo(
    etype: IcmpEchoType,
    ip_src: IpAddr,
    ip_dst: IpAddr,
    ident: u16,
    seq_no: u16,
    data: &[u8],
) -> IcmpPkt {
    match (ip_src, ip_dst) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => {
            gen_icmpv4_echo(etype, src, dst, ident, seq_no, data)
        }
        (IpAddr::V6(src), IpAddr::V6(dst)) => {
            gen_icmpv6_echo(etype, src, dst, ident, seq_no, data)
        }
        (_, _) => panic!("IP src and dst versions must match"),
    }
}

pub fn gen_icmpv4_echo(
    etype: IcmpEchoType,
    ip_src: Ipv4Addr,
    ip_dst: Ipv4Addr,
    ident: u16,
    seq_no: u16,
    data: &[u8],
) -> IcmpPkt {
    let icmp = match etype {
        IcmpEchoType::Req => Icmpv4Repr::EchoRequest { ident, seq_no, data },
        IcmpEchoType::Reply => Icmpv4Repr::EchoReply { ident, seq_no, data },
    };
    let mut icmp_bytes = vec![0u8; icmp.buffer_len()];
    let mut icmp_pkt = Icmpv4Packet::new_unchecked(&mut icmp_bytes);
    icmp.emit(&mut icmp_pkt, &Default::default());

    IcmpPkt::from_datagram(ipv4_datagram(
        ip_src,
        ip_dst,
        PROTO_ICMP,
        &icmp_bytes,
    ))
}

pub fn gen_icmpv6_echo(
    etype: IcmpEchoType,
    ip_src: Ipv6Addr,
    ip_dst: Ipv6Addr,
    ident: u16,
    seq_no: u16,
    data: &[u8],
) -> IcmpPkt {
    let icmp = match etype {
        IcmpEchoType::Req => Icmpv6Repr::EchoRequest { ident, seq_no, data },
        IcmpEchoType::Reply => Icmpv6Repr::EchoReply { ident, seq_no, data },
    };

    let mut body_bytes = vec![0u8; icmp.buffer_len()];
    let mut req_pkt = Icmpv6Packet::new_unchecked(&mut body_bytes);
    icmp.emit(
        &Ipv6Address::from_bytes(&ip_src.octets()).into(),
        &Ipv6Address::from_bytes(&ip_dst.octets()).into(),
        &mut req_pkt,
        &Default::default(),
    );

    IcmpPkt::from_datagram(ipv6_datagram(
        ip_src,
        ip_dst,
        PROTO_ICMPV6,
        &body_bytes,
    ))
}

/// Generate an NDP packet given an inner `repr`.
pub fn generate_ndisc(
    repr: NdiscRepr,
    src_ip: Ipv6Addr,
    dst_ip: Ipv6Addr,
) -> IcmpPkt {
    let req = Icmpv6Repr::Ndisc(repr);
    let mut body = vec![0u8; req.buffer_len()];
    let mut req_pkt = Icmpv6Packet::new_unchecked(&mut body);
    req.emit(
        &IpAddress::Ipv6(Ipv6Address::from_bytes(&src_ip.octets())),
        &IpAddress::Ipv6(Ipv6Address::from_bytes(&dst_ip.octets())),
        &mut req_pkt,
        &CsumCapab::default(),
    );

    let mut datagram = ipv6_datagram(src_ip, dst_ip, PROTO_ICMPV6, &body);
    // NDP is only valid with a hop limit of 255.
    datagram[7] = 255;
    IcmpPkt::from_datagram(datagram)
}

/// Generate a Router Solicitation sent to all-routers.
pub fn gen_router_solicitation(src_ip: Ipv6Addr, src_mac: [u8; 6]) -> IcmpPkt {
    let solicit = NdiscRepr::RouterSolicit {
        lladdr: Some(RawHardwareAddress::from_bytes(&src_mac)),
    };
    let all_routers = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);

    generate_ndisc(solicit, src_ip, all_routers)
}

/// Generate a Router Advertisement sent to all-nodes, with no
/// options.
pub fn gen_router_advert(src_ip: Ipv6Addr, router_lifetime: u16) -> IcmpPkt {
    let all_nodes = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);
    let lifetime = router_lifetime.to_be_bytes();
    // Cur hop limit, flags, router lifetime.
    let rest = [64, 0, lifetime[0], lifetime[1]];
    // Reachable time, retrans timer.
    let body = [0u8; 8];
    let msg = icmpv6_msg(src_ip, all_nodes, v6::ROUTER_ADVERT, 0, rest, &body);

    let mut datagram = ipv6_datagram(src_ip, all_nodes, PROTO_ICMPV6, &msg);
    datagram[7] = 255;
    IcmpPkt::from_datagram(datagram)
}

/// Generate a destination unreachable quoting `quoted`.
pub fn gen_icmpv4_unreach(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    code: u8,
    quoted: &[u8],
) -> IcmpPkt {
    gen_icmpv4(src, dst, v4::DEST_UNREACH, code, [0; 4], quoted)
}

/// Generate a time exceeded quoting `quoted`.
pub fn gen_icmpv4_time_exceeded(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    quoted: &[u8],
) -> IcmpPkt {
    gen_icmpv4(src, dst, v4::TIME_EXCEEDED, 0, [0; 4], quoted)
}

/// Generate an ICMPv6 error message of type `ty` quoting `quoted`.
pub fn gen_icmpv6_error(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    ty: u8,
    code: u8,
    quoted: &[u8],
) -> IcmpPkt {
    // Only a packet too big carries anything in the rest of the
    // header: the MTU.
    let rest =
        if ty == v6::PACKET_TOO_BIG { 1280u32.to_be_bytes() } else { [0; 4] };
    gen_icmpv6(src, dst, ty, code, rest, quoted)
}

/// Frame an IP datagram for Ethernet, from the guest to the gateway.
pub fn eth_frame(datagram: &[u8]) -> Vec<u8> {
    let ethertype = match datagram.first().map(|b| b >> 4) {
        Some(6) => EthernetProtocol::Ipv6,
        _ => EthernetProtocol::Ipv4,
    };
    let eth = EthernetRepr {
        src_addr: EthernetAddress(GUEST_MAC),
        dst_addr: EthernetAddress(GW_MAC),
        ethertype,
    };

    let len = (eth.buffer_len() + datagram.len()).max(ETHER_MIN_LEN);
    let mut bytes = vec![0u8; len];
    let mut frame = EthernetFrame::new_unchecked(&mut bytes);
    eth.emit(&mut frame);
    frame.payload_mut()[..datagram.len()].copy_from_slice(datagram);
    bytes
}
