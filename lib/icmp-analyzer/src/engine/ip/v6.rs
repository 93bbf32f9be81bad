// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! IPv6 headers.

use crate::api::Protocol;
use std::net::Ipv6Addr;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const IPV6_VERSION: u8 = 6;

pub const EXT_HOP_BY_HOP: u8 = 0;
pub const EXT_ROUTING: u8 = 43;
pub const EXT_FRAGMENT: u8 = 44;
pub const EXT_AUTH: u8 = 51;
pub const EXT_DEST_OPTS: u8 = 60;

const FRAG_EXT_LEN: usize = 8;

#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct Ipv6HdrRaw {
    pub vsn_class_flow: [u8; 4],
    pub payload_len: [u8; 2],
    pub next_hdr: u8,
    pub hop_limit: u8,
    pub src: [u8; 16],
    pub dst: [u8; 16],
}

impl Ipv6HdrRaw {
    /// The fixed header is always 40 bytes.
    pub const BASE_SIZE: usize = core::mem::size_of::<Self>();

    pub fn version(&self) -> u8 {
        self.vsn_class_flow[0] >> 4
    }

    pub fn payload_len(&self) -> u16 {
        u16::from_be_bytes(self.payload_len)
    }

    pub fn next_hdr(&self) -> u8 {
        self.next_hdr
    }

    pub fn src(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.src)
    }

    pub fn dst(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.dst)
    }
}

/// Walk the extension header chain starting with `next_hdr`, whose
/// bytes begin at `data`.
///
/// Returns the combined length of the extension headers and the
/// upper-layer protocol that follows them, or `None` if the chain runs
/// past the end of `data`.
pub fn walk_ext_hdrs(
    mut next_hdr: u8,
    data: &[u8],
) -> Option<(usize, Protocol)> {
    let mut off = 0;

    loop {
        let len = match next_hdr {
            EXT_HOP_BY_HOP | EXT_ROUTING | EXT_DEST_OPTS => {
                (usize::from(*data.get(off + 1)?) + 1) * 8
            }
            EXT_FRAGMENT => FRAG_EXT_LEN,
            EXT_AUTH => (usize::from(*data.get(off + 1)?) + 2) * 4,
            _ => return Some((off, Protocol::from(next_hdr))),
        };

        if data.len() < off + len {
            return None;
        }

        next_hdr = data[off];
        off += len;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_extensions() {
        assert_eq!(walk_ext_hdrs(58, &[]), Some((0, Protocol::ICMPv6)));
    }

    #[test]
    fn hop_by_hop_then_fragment() {
        let mut data = vec![EXT_FRAGMENT, 0, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(&[17, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            walk_ext_hdrs(EXT_HOP_BY_HOP, &data),
            Some((16, Protocol::UDP))
        );
    }

    #[test]
    fn truncated_chain() {
        let data = [EXT_ROUTING, 1, 0, 0];
        assert_eq!(walk_ext_hdrs(EXT_DEST_OPTS, &data), None);
        assert_eq!(walk_ext_hdrs(EXT_DEST_OPTS, &[]), None);
    }
}
