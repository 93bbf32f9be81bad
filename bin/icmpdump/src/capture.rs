// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Reading legacy pcap files down to IP datagrams.

use icmp_analyzer::engine::time::Moment;
use pcap_parser::Linktype;
use pcap_parser::pcap;
use pcap_parser::pcap::LegacyPcapBlock;
use smoltcp::wire::EthernetFrame;
use smoltcp::wire::EthernetProtocol;
use thiserror::Error;

/// The 802.1Q tag protocol identifier.
const ETHERTYPE_VLAN: u16 = 0x8100;
const VLAN_TAG_LEN: usize = 4;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CaptureError {
    #[error("bad pcap header: {0}")]
    BadHeader(String),

    #[error("unsupported link type: {0}")]
    UnsupportedLinktype(i32),

    #[error("bad pcap record at offset {offset}: {msg}")]
    BadRecord { offset: usize, msg: String },
}

/// The link layers icmpdump knows how to peel off.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkType {
    Ethernet,
    /// Frames are bare IPv4 or IPv6 datagrams.
    Raw,
}

impl TryFrom<Linktype> for LinkType {
    type Error = CaptureError;

    fn try_from(lt: Linktype) -> Result<Self, Self::Error> {
        match lt {
            Linktype::ETHERNET => Ok(Self::Ethernet),
            Linktype::RAW | Linktype::IPV4 | Linktype::IPV6 => Ok(Self::Raw),
            Linktype(other) => Err(CaptureError::UnsupportedLinktype(other)),
        }
    }
}

impl LinkType {
    /// Return the IP datagram carried by `frame`, or `None` if it
    /// doesn't carry one.
    pub fn ip_datagram(self, frame: &[u8]) -> Option<&[u8]> {
        match self {
            Self::Raw => Some(frame),
            Self::Ethernet => {
                let eth = EthernetFrame::new_checked(frame).ok()?;
                let mut off = EthernetFrame::<&[u8]>::header_len();
                let mut ethertype = eth.ethertype();

                if ethertype == EthernetProtocol::Unknown(ETHERTYPE_VLAN) {
                    // The real ethertype follows the tag control info.
                    let inner = frame.get(off + 2..off + VLAN_TAG_LEN)?;
                    ethertype = u16::from_be_bytes([inner[0], inner[1]]).into();
                    off += VLAN_TAG_LEN;
                }

                match ethertype {
                    EthernetProtocol::Ipv4 | EthernetProtocol::Ipv6 => {
                        frame.get(off..)
                    }
                    _ => None,
                }
            }
        }
    }
}

/// One captured frame.
#[derive(Clone, Copy, Debug)]
pub struct Record<'a> {
    pub ts: Moment,
    /// Length of the frame on the wire.
    pub origlen: u32,
    pub data: &'a [u8],
}

/// Decode a legacy pcap file held in `bytes`.
pub fn read_capture(
    bytes: &[u8],
) -> Result<(LinkType, Vec<Record<'_>>), CaptureError> {
    let (mut rest, hdr) = pcap::parse_pcap_header(bytes)
        .map_err(|e| CaptureError::BadHeader(format!("{e:?}")))?;
    let link = LinkType::try_from(hdr.network)?;
    let big_endian = hdr.is_bigendian();
    let nanos = hdr.is_nanosecond_precision();

    let mut records = Vec::new();
    while !rest.is_empty() {
        let offset = bytes.len() - rest.len();
        let res = if big_endian {
            pcap::parse_pcap_frame_be(rest)
        } else {
            pcap::parse_pcap_frame(rest)
        };
        let (next, block) = res.map_err(|e| CaptureError::BadRecord {
            offset,
            msg: format!("{e:?}"),
        })?;

        records.push(to_record(&block, nanos));
        rest = next;
    }

    Ok((link, records))
}

fn to_record<'a>(block: &LegacyPcapBlock<'a>, nanos: bool) -> Record<'a> {
    let usecs = if nanos { block.ts_usec / 1000 } else { block.ts_usec };
    Record {
        ts: Moment::from_timeval(block.ts_sec, usecs),
        origlen: block.origlen,
        data: block.data,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use icmp_test_utils::*;
    use icmp_test_utils::pcap::PcapBuilder;

    const SRC: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
    const DST: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 6);

    #[test]
    fn read_ethernet() {
        let pkt = gen_icmpv4_echo(IcmpEchoType::Req, SRC, DST, 1, 2, b"hi");
        let mut pcap = PcapBuilder::in_memory(Linktype::ETHERNET);
        pcap.add_pkt(&pkt.eth_frame(), 10, 250);
        pcap.add_pkt(&pkt.eth_frame(), 11, 0);
        let bytes = pcap.finish();

        let (link, records) = read_capture(&bytes).unwrap();
        assert_eq!(link, LinkType::Ethernet);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ts, Moment::from_timeval(10, 250));
        assert_eq!(records[1].ts, Moment::from_timeval(11, 0));

        let datagram = link.ip_datagram(records[0].data).unwrap();
        assert!(datagram.starts_with(pkt.datagram()));
    }

    #[test]
    fn read_raw() {
        let pkt = gen_icmpv4_echo(IcmpEchoType::Req, SRC, DST, 1, 2, b"hi");
        let mut pcap = PcapBuilder::in_memory(Linktype::RAW);
        pcap.add_pkt(pkt.datagram(), 1, 0);
        let bytes = pcap.finish();

        let (link, records) = read_capture(&bytes).unwrap();
        assert_eq!(link, LinkType::Raw);
        assert_eq!(link.ip_datagram(records[0].data), Some(pkt.datagram()));
    }

    #[test]
    fn snapped_record() {
        let pkt = gen_icmpv4_echo(IcmpEchoType::Req, SRC, DST, 1, 2, b"hi");
        let mut pcap = PcapBuilder::in_memory(Linktype::RAW);
        pcap.add_pkt_snapped(pkt.datagram(), 1, 0, 24);
        let bytes = pcap.finish();

        let (_, records) = read_capture(&bytes).unwrap();
        assert_eq!(records[0].data.len(), 24);
        assert_eq!(records[0].origlen as usize, pkt.datagram().len());
    }

    #[test]
    fn vlan_tagged() {
        let pkt = gen_icmpv4_echo(IcmpEchoType::Req, SRC, DST, 1, 2, b"hi");
        let frame = pkt.eth_frame();
        let mut tagged = frame[..12].to_vec();
        tagged.extend_from_slice(&[0x81, 0x00, 0x00, 0x05]);
        tagged.extend_from_slice(&frame[12..]);

        let datagram = LinkType::Ethernet.ip_datagram(&tagged).unwrap();
        assert!(datagram.starts_with(pkt.datagram()));
    }

    #[test]
    fn not_ip() {
        let mut frame = vec![0u8; 60];
        // ARP
        frame[12..14].copy_from_slice(&[0x08, 0x06]);
        assert_eq!(LinkType::Ethernet.ip_datagram(&frame), None);
        assert_eq!(LinkType::Ethernet.ip_datagram(&frame[..10]), None);
    }

    #[test]
    fn unsupported_linktype() {
        let pcap = PcapBuilder::in_memory(Linktype::NULL);
        let bytes = pcap.finish();
        assert_eq!(
            read_capture(&bytes).unwrap_err(),
            CaptureError::UnsupportedLinktype(0)
        );
    }

    #[test]
    fn truncated_record() {
        let pkt = gen_icmpv4_echo(IcmpEchoType::Req, SRC, DST, 1, 2, b"hi");
        let mut pcap = PcapBuilder::in_memory(Linktype::RAW);
        pcap.add_pkt(pkt.datagram(), 1, 0);
        let mut bytes = pcap.finish();
        bytes.truncate(bytes.len() - 3);

        let err = read_capture(&bytes).unwrap_err();
        assert!(matches!(err, CaptureError::BadRecord { offset: 24, .. }));
    }
}
