// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! IPv4 headers.

use crate::api::Protocol;
use crate::engine::checksum::CSUM_OK;
use crate::engine::checksum::Checksum;
use std::net::Ipv4Addr;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const IPV4_HDR_LEN_MASK: u8 = 0x0F;
pub const IPV4_HDR_VER_MASK: u8 = 0xF0;
pub const IPV4_HDR_VER_SHIFT: u8 = 4;
pub const IPV4_VERSION: u8 = 4;

pub const IPV4_FLAG_DF: u16 = 0x4000;
pub const IPV4_FLAG_MF: u16 = 0x2000;
pub const IPV4_FRAG_OFFSET_MASK: u16 = 0x1FFF;

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct Ipv4HdrRaw {
    pub ver_hdr_len: u8,
    pub dscp_ecn: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub frag_and_flags: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub csum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl Ipv4HdrRaw {
    /// The size of the base header, without options. This is also
    /// the smallest legal header length.
    pub const BASE_SIZE: usize = core::mem::size_of::<Self>();

    pub fn version(&self) -> u8 {
        (self.ver_hdr_len & IPV4_HDR_VER_MASK) >> IPV4_HDR_VER_SHIFT
    }

    /// The header length, options included, in bytes.
    pub fn hdr_len(&self) -> usize {
        usize::from(self.ver_hdr_len & IPV4_HDR_LEN_MASK) * 4
    }

    pub fn total_len(&self) -> u16 {
        u16::from_be_bytes(self.total_len)
    }

    /// The flags and fragment offset as one 16-bit field.
    pub fn frag_field(&self) -> u16 {
        u16::from_be_bytes(self.frag_and_flags)
    }

    pub fn df(&self) -> bool {
        self.frag_field() & IPV4_FLAG_DF != 0
    }

    pub fn mf(&self) -> bool {
        self.frag_field() & IPV4_FLAG_MF != 0
    }

    /// The fragment offset in 8-byte units, as carried on the wire.
    pub fn frag_offset(&self) -> u16 {
        self.frag_field() & IPV4_FRAG_OFFSET_MASK
    }

    pub fn proto(&self) -> Protocol {
        Protocol::from(self.proto)
    }

    pub fn src(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src)
    }

    pub fn dst(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst)
    }
}

/// Does the header checksum hold over `hdr`, which must be exactly
/// the header bytes (options included)?
pub fn hdr_csum_ok(hdr: &[u8]) -> bool {
    Checksum::compute(hdr).finalize() == CSUM_OK
}
