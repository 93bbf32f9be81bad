// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::ip::TransportProto;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

/// The identity of a flow.
///
/// For ICMP flows the "ports" are overloaded: the source port carries
/// the ICMP type and the destination port carries the type expected
/// in reply (its counterpart). That way a reply's identity is the
/// mirror of its request's.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct ConnId {
    pub src: IpAddr,
    pub src_port: u16,
    pub dst: IpAddr,
    pub dst_port: u16,
    pub proto: TransportProto,
}

impl ConnId {
    /// An all-zero identity of the given address family, used for
    /// embedded headers too damaged to read.
    pub const fn unspecified(v6: bool) -> Self {
        let addr = if v6 {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };

        Self {
            src: addr,
            src_port: 0,
            dst: addr,
            dst_port: 0,
            proto: TransportProto::Unknown,
        }
    }

    /// Swap source and destination, addresses and ports both.
    pub fn mirror(self) -> Self {
        Self {
            src: self.dst,
            src_port: self.dst_port,
            dst: self.src,
            dst_port: self.src_port,
            proto: self.proto,
        }
    }
}

impl Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.proto, self.src, self.src_port, self.dst, self.dst_port,
        )
    }
}

/// Summary of an ICMP message, shared by every event of a flow.
///
/// The analyzer builds this once, from the first message it accepts
/// on a flow, and hands out that same value for the flow's lifetime.
/// It is not refreshed by later messages: read it as a summary of the
/// flow's first ICMP message, not of the message an event is about.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IcmpSummary {
    pub orig_h: IpAddr,
    pub resp_h: IpAddr,
    pub itype: u8,
    pub icode: u8,
    /// Length of the message past the 8-byte common header.
    pub len: u32,
    pub v6: bool,
}

impl Display for IcmpSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} -> {} type={} code={} len={}{}",
            self.orig_h,
            self.resp_h,
            self.itype,
            self.icode,
            self.len,
            if self.v6 { " v6" } else { "" },
        )
    }
}

/// The original datagram quoted inside an ICMP error message.
///
/// Damage to the quoted datagram is reported through the flag fields
/// rather than as an error; a record is produced for every error
/// message no matter how little of the datagram was captured.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ContextRecord {
    pub id: ConnId,
    pub len: u32,
    pub proto: TransportProto,
    pub bad_hdr_len: bool,
    pub bad_checksum: bool,
    pub frag_offset: u32,
    pub mf: bool,
    pub df: bool,
}

impl ContextRecord {
    /// The record for a quoted header that could not be read at all.
    pub fn bad_header(v6: bool) -> Self {
        Self {
            id: ConnId::unspecified(v6),
            len: 0,
            proto: TransportProto::Unknown,
            bad_hdr_len: true,
            bad_checksum: false,
            frag_offset: 0,
            mf: false,
            // IPv6 has no don't-fragment bit, it simply never
            // fragments in flight.
            df: v6,
        }
    }
}

impl Display for ContextRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{} len={}", self.id, self.len)?;
        if self.bad_hdr_len {
            write!(f, " bad_hdr_len")?;
        }
        if self.bad_checksum {
            write!(f, " bad_checksum")?;
        }
        if self.mf || self.frag_offset != 0 {
            let more = if self.mf { "+" } else { "" };
            write!(f, " frag={}{more}", self.frag_offset)?;
        }
        if self.df {
            write!(f, " DF")?;
        }
        write!(f, "]")
    }
}

/// Activity of one side of a flow.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub enum EndpointStatus {
    #[default]
    Inactive,
    Active,
}

impl Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "INACTIVE"),
            Self::Active => write!(f, "ACTIVE"),
        }
    }
}

/// What the connection framework is told about one side of a flow.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct EndpointSummary {
    pub size: u32,
    pub state: EndpointStatus,
}

/// Both sides of a flow, as reported by the endpoint summary query.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct ConnEndpoints {
    pub orig: EndpointSummary,
    pub resp: EndpointSummary,
}
