// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Internet Control Message Protocol (ICMP) shared data structures.

pub mod v4;
pub mod v6;

use crate::api::ConnId;
use crate::api::EventKind;
use crate::api::IcmpVersion;
use std::net::IpAddr;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

/// The common header shared by every ICMP(v6) message.
///
/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct IcmpHdrRaw {
    pub msg_type: u8,
    pub msg_code: u8,
    pub csum: [u8; 2],
    pub rest_of_header: [u8; 4],
}

impl IcmpHdrRaw {
    /// An ICMP(v6) header is always 8 bytes: type, code, checksum and
    /// four type-specific bytes.
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// The echo identifier, for echo request/reply messages.
    pub fn echo_id(&self) -> u16 {
        u16::from_be_bytes([self.rest_of_header[0], self.rest_of_header[1]])
    }

    /// The echo sequence number, for echo request/reply messages.
    pub fn echo_seq(&self) -> u16 {
        u16::from_be_bytes([self.rest_of_header[2], self.rest_of_header[3]])
    }
}

/// The expected reply to a message type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Counterpart {
    /// The reply type; for a one-way message this is the message's
    /// code, passed through unchanged.
    pub ty: u8,
    /// The message type has no reply.
    pub one_way: bool,
}

/// Look up the type expected in reply to `ty` under the given ICMP
/// version.
///
/// This is total: a type with no defined reply is one-way, and its
/// `code` is handed back as the counterpart.
pub fn counterpart(vsn: IcmpVersion, ty: u8, code: u8) -> Counterpart {
    let table = match vsn {
        IcmpVersion::V4 => &v4::COUNTERPARTS,
        IcmpVersion::V6 => &v6::COUNTERPARTS,
    };

    match table[usize::from(ty)] {
        Some(reply) => Counterpart { ty: reply, one_way: false },
        None => Counterpart { ty: code, one_way: true },
    }
}

/// Expand `(request, reply)` pairs into a table indexed by type.
///
/// `sym` pairs map both ways; the rest map only request to reply.
pub(crate) const fn build_table(
    sym: &[(u8, u8)],
    asym: &[(u8, u8)],
) -> [Option<u8>; 256] {
    let mut table = [None; 256];

    let mut i = 0;
    while i < sym.len() {
        let (req, reply) = sym[i];
        table[req as usize] = Some(reply);
        table[reply as usize] = Some(req);
        i += 1;
    }

    let mut i = 0;
    while i < asym.len() {
        let (req, reply) = asym[i];
        table[req as usize] = Some(reply);
        i += 1;
    }

    table
}

/// What a message is, as far as event dispatch is concerned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MsgClass {
    /// Echo request or reply, raising the given event.
    Echo(EventKind),
    /// An error message quoting the datagram that provoked it.
    Context(EventKind),
    /// Router and neighbor discovery (ICMPv6 only).
    Router,
    /// Anything else: only the catch-all event.
    Other,
}

pub fn classify(vsn: IcmpVersion, ty: u8) -> MsgClass {
    match vsn {
        IcmpVersion::V4 => v4::classify(ty),
        IcmpVersion::V6 => v6::classify(ty),
    }
}

/// Build the identity of an ICMP flow from the message that starts
/// it: the "ports" are the message type and its counterpart.
pub fn conn_id(
    vsn: IcmpVersion,
    src: IpAddr,
    dst: IpAddr,
    ty: u8,
    code: u8,
) -> ConnId {
    ConnId {
        src,
        src_port: u16::from(ty),
        dst,
        dst_port: u16::from(counterpart(vsn, ty, code).ty),
        proto: vsn.transport(),
    }
}
