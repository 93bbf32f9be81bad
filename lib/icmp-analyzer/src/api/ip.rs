// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub const PROTO_ICMP: u8 = 0x1;
pub const PROTO_IGMP: u8 = 0x2;
pub const PROTO_TCP: u8 = 0x6;
pub const PROTO_UDP: u8 = 0x11;
pub const PROTO_ICMPV6: u8 = 0x3A;

/// An IP next-protocol value.
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
pub enum Protocol {
    ICMP,
    IGMP,
    TCP,
    UDP,
    ICMPv6,
    Unknown(u8),
}

impl Default for Protocol {
    fn default() -> Self {
        Self::Unknown(255)
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ICMP => write!(f, "ICMP"),
            Self::IGMP => write!(f, "IGMP"),
            Self::TCP => write!(f, "TCP"),
            Self::UDP => write!(f, "UDP"),
            Self::ICMPv6 => write!(f, "ICMPv6"),
            Self::Unknown(p) => write!(f, "Unknown({p})"),
        }
    }
}

impl From<u8> for Protocol {
    fn from(proto: u8) -> Self {
        match proto {
            PROTO_ICMP => Self::ICMP,
            PROTO_IGMP => Self::IGMP,
            PROTO_TCP => Self::TCP,
            PROTO_UDP => Self::UDP,
            PROTO_ICMPV6 => Self::ICMPv6,
            _ => Self::Unknown(proto),
        }
    }
}

impl From<Protocol> for u8 {
    fn from(proto: Protocol) -> u8 {
        match proto {
            Protocol::ICMP => PROTO_ICMP,
            Protocol::IGMP => PROTO_IGMP,
            Protocol::TCP => PROTO_TCP,
            Protocol::UDP => PROTO_UDP,
            Protocol::ICMPv6 => PROTO_ICMPV6,
            Protocol::Unknown(v) => v,
        }
    }
}

/// The transport a flow identity's "ports" belong to.
///
/// This is coarser than [`Protocol`]: it names only the transports
/// whose port-equivalent fields the analyzer knows how to read.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum TransportProto {
    #[default]
    Unknown,
    Tcp,
    Udp,
    Icmp,
    Icmpv6,
}

impl TransportProto {
    /// The IP protocol number of this transport, if it has one.
    pub fn proto_num(&self) -> Option<u8> {
        match self {
            Self::Unknown => None,
            Self::Tcp => Some(PROTO_TCP),
            Self::Udp => Some(PROTO_UDP),
            Self::Icmp => Some(PROTO_ICMP),
            Self::Icmpv6 => Some(PROTO_ICMPV6),
        }
    }
}

impl Display for TransportProto {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
            Self::Icmpv6 => "icmp6",
        };
        write!(f, "{s}")
    }
}

/// The ICMP variant a message belongs to.
///
/// This is derived from the outer header's next protocol and threaded
/// through checksum, classification and context extraction, as the
/// two versions disagree on nearly every rule.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum IcmpVersion {
    V4,
    V6,
}

impl IcmpVersion {
    /// Map an outer next protocol onto the ICMP variant it carries.
    pub fn from_proto(proto: Protocol) -> Option<Self> {
        match proto {
            Protocol::ICMP => Some(Self::V4),
            Protocol::ICMPv6 => Some(Self::V6),
            _ => None,
        }
    }

    pub fn is_v6(&self) -> bool {
        matches!(self, Self::V6)
    }

    pub fn transport(&self) -> TransportProto {
        match self {
            Self::V4 => TransportProto::Icmp,
            Self::V6 => TransportProto::Icmpv6,
        }
    }
}

impl Display for IcmpVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "ICMPv4"),
            Self::V6 => write!(f, "ICMPv6"),
        }
    }
}
