// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The outer IP header, as already decoded by whatever delivered the
//! packet to the analyzer.

pub mod v4;
pub mod v6;

use crate::api::Protocol;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use thiserror::Error;
use v4::IPV4_VERSION;
use v4::Ipv4HdrRaw;
use v6::IPV6_VERSION;
use v6::Ipv6HdrRaw;
use zerocopy::FromBytes;

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum HdrError {
    #[error("header truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("bad IP version {0}")]
    BadVersion(u8),

    #[error("bad header length {0}")]
    BadHdrLen(usize),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv4Meta {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub proto: Protocol,
    pub hdr_len: u16,
    pub total_len: u16,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv6Meta {
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    /// The upper-layer protocol, found past any extension headers.
    pub next_hdr: Protocol,
    /// The fixed header plus extension headers.
    pub hdr_len: u16,
    pub pay_len: u16,
}

/// A decoded outer IP header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IpHdr {
    V4(Ipv4Meta),
    V6(Ipv6Meta),
}

impl From<Ipv4Meta> for IpHdr {
    fn from(meta: Ipv4Meta) -> Self {
        Self::V4(meta)
    }
}

impl From<Ipv6Meta> for IpHdr {
    fn from(meta: Ipv6Meta) -> Self {
        Self::V6(meta)
    }
}

impl IpHdr {
    /// Decode the IP header at the front of `bytes`.
    ///
    /// On success the header is returned along with everything in
    /// `bytes` after it, as captured; trailing link-layer padding is
    /// left in place.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), HdrError> {
        let Some(first) = bytes.first() else {
            return Err(HdrError::Truncated { need: 1, have: 0 });
        };

        match first >> 4 {
            IPV4_VERSION => Self::parse_v4(bytes),
            IPV6_VERSION => Self::parse_v6(bytes),
            vsn => Err(HdrError::BadVersion(vsn)),
        }
    }

    fn parse_v4(bytes: &[u8]) -> Result<(Self, &[u8]), HdrError> {
        let (hdr, _) = Ipv4HdrRaw::ref_from_prefix(bytes).map_err(|_| {
            HdrError::Truncated {
                need: Ipv4HdrRaw::BASE_SIZE,
                have: bytes.len(),
            }
        })?;

        let hdr_len = hdr.hdr_len();
        if hdr_len < Ipv4HdrRaw::BASE_SIZE {
            return Err(HdrError::BadHdrLen(hdr_len));
        }
        if bytes.len() < hdr_len {
            let have = bytes.len();
            return Err(HdrError::Truncated { need: hdr_len, have });
        }
        if usize::from(hdr.total_len()) < hdr_len {
            return Err(HdrError::BadHdrLen(hdr_len));
        }

        let meta = Ipv4Meta {
            src: hdr.src(),
            dst: hdr.dst(),
            proto: hdr.proto(),
            hdr_len: hdr_len as u16,
            total_len: hdr.total_len(),
        };

        Ok((meta.into(), &bytes[hdr_len..]))
    }

    fn parse_v6(bytes: &[u8]) -> Result<(Self, &[u8]), HdrError> {
        let (hdr, rest) = Ipv6HdrRaw::ref_from_prefix(bytes).map_err(|_| {
            HdrError::Truncated {
                need: Ipv6HdrRaw::BASE_SIZE,
                have: bytes.len(),
            }
        })?;

        let (ext_len, next_hdr) = v6::walk_ext_hdrs(hdr.next_hdr(), rest)
            .ok_or(HdrError::Truncated {
                need: Ipv6HdrRaw::BASE_SIZE + 1,
                have: bytes.len(),
            })?;

        if ext_len > usize::from(hdr.payload_len()) {
            return Err(HdrError::BadHdrLen(Ipv6HdrRaw::BASE_SIZE + ext_len));
        }

        let hdr_len = Ipv6HdrRaw::BASE_SIZE + ext_len;
        let meta = Ipv6Meta {
            src: hdr.src(),
            dst: hdr.dst(),
            next_hdr,
            hdr_len: hdr_len as u16,
            pay_len: hdr.payload_len(),
        };

        Ok((meta.into(), &bytes[hdr_len..]))
    }

    /// The protocol of the payload this header carries.
    pub fn proto(&self) -> Protocol {
        match self {
            Self::V4(v4) => v4.proto,
            Self::V6(v6) => v6.next_hdr,
        }
    }

    pub fn src(&self) -> IpAddr {
        match self {
            Self::V4(v4) => v4.src.into(),
            Self::V6(v6) => v6.src.into(),
        }
    }

    pub fn dst(&self) -> IpAddr {
        match self {
            Self::V4(v4) => v4.dst.into(),
            Self::V6(v6) => v6.dst.into(),
        }
    }

    pub fn hdr_len(&self) -> usize {
        match self {
            Self::V4(v4) => usize::from(v4.hdr_len),
            Self::V6(v6) => usize::from(v6.hdr_len),
        }
    }

    /// The declared length of the datagram, header included.
    pub fn total_len(&self) -> usize {
        match self {
            Self::V4(v4) => usize::from(v4.total_len),
            Self::V6(v6) => Ipv6HdrRaw::BASE_SIZE + usize::from(v6.pay_len),
        }
    }

    /// The declared length of the upper-layer payload.
    pub fn payload_len(&self) -> usize {
        self.total_len().saturating_sub(self.hdr_len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_v4_leaves_padding() {
        let mut pkt = vec![
            0x45, 0x00, 0x00, 0x1c, 0x00, 0x00, 0x00, 0x00, 0x40, 0x01,
            0x00, 0x00, 0x0a, 0x00, 0x00, 0x01, 0x0a, 0x00, 0x00, 0x02,
        ];
        pkt.extend_from_slice(&[8, 0, 0, 0, 0, 0, 0, 0]);
        // Ethernet minimum frame padding.
        pkt.extend_from_slice(&[0; 18]);

        let (ip, rest) = IpHdr::parse(&pkt).unwrap();
        assert_eq!(ip.proto(), Protocol::ICMP);
        assert_eq!(ip.hdr_len(), 20);
        assert_eq!(ip.payload_len(), 8);
        assert_eq!(rest.len(), 26);
        assert_eq!(ip.src(), IpAddr::from([10, 0, 0, 1]));
    }

    #[test]
    fn parse_v6_skips_extensions() {
        let mut pkt = vec![0x60, 0, 0, 0, 0, 16, v6::EXT_HOP_BY_HOP, 64];
        pkt.extend_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0]);
        pkt.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
        pkt.extend_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0]);
        pkt.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 2]);
        pkt.extend_from_slice(&[58, 0, 0, 0, 0, 0, 0, 0]);
        pkt.extend_from_slice(&[133, 0, 0, 0, 0, 0, 0, 0]);

        let (ip, rest) = IpHdr::parse(&pkt).unwrap();
        assert_eq!(ip.proto(), Protocol::ICMPv6);
        assert_eq!(ip.hdr_len(), 48);
        assert_eq!(ip.payload_len(), 8);
        assert_eq!(rest, &[133, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            IpHdr::parse(&[]),
            Err(HdrError::Truncated { need: 1, have: 0 })
        );
        assert_eq!(IpHdr::parse(&[0x20; 40]), Err(HdrError::BadVersion(2)));
        assert_eq!(
            IpHdr::parse(&[0x45; 10]),
            Err(HdrError::Truncated { need: 20, have: 10 })
        );

        let mut short_ihl = [0u8; 20];
        short_ihl[0] = 0x44;
        assert_eq!(IpHdr::parse(&short_ihl), Err(HdrError::BadHdrLen(16)));
    }
}
