// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The internet checksum, as ICMP and ICMPv6 use it.
//!
//! [`Checksum`] is a rolling one's complement sum: bytes are added
//! piecewise and the carries folded only when the sum is finalized.
//! That lets the ICMPv6 check sum its pseudo-header and the message
//! without first copying them into one buffer.
//!
//! # Verifying
//!
//! A message is intact when the one's complement sum over all of its
//! bytes, checksum field included, is all ones ([`CSUM_OK`]). Nothing
//! here complements or byte-swaps the stored checksum to compare it;
//! the field is summed in place like every other pair of bytes.
//!
//! # Endianness
//!
//! Pairs of bytes are summed as native-endian `u16`s. The one's
//! complement sum is byte-order independent (RFC 1071 §1.B), so the
//! folded result is correct on either kind of host as long as it is
//! written back with `to_ne_bytes()`. The all-ones sentinel is the
//! same value in both byte orders.
//!
//! # Relevant RFCs
//!
//! * 1071 Computing the Internet Checksum
//!
//! * 4443 §2.3 ICMPv6 message checksum
//!
//! * 8200 §8.1 Upper-layer checksums

use std::net::Ipv6Addr;

/// The finalized sum of a message whose checksum is correct.
pub const CSUM_OK: u16 = 0xFFFF;

/// The next-header value placed in the ICMPv6 pseudo-header.
const PSEUDO_NEXT_HDR_ICMPV6: u8 = 58;

/// The checksum values, as it is contained in a network header.
///
/// This holds the bytes as they are stored in the header itself,
/// i.e. with one's complement applied.
pub struct HeaderChecksum {
    inner: [u8; 2],
}

impl HeaderChecksum {
    /// Return the bytes of this header checksum.
    pub fn bytes(&self) -> [u8; 2] {
        self.inner
    }
}

impl From<Checksum> for HeaderChecksum {
    /// Finalize the rolling checksum and put it into header form by
    /// performing one's complement.
    fn from(mut csum: Checksum) -> HeaderChecksum {
        Self { inner: (!csum.finalize()).to_ne_bytes() }
    }
}

/// A rolling one's complement checksum calculation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    inner: u32,
}

impl Checksum {
    /// Creates a new checksum counter.
    pub fn new() -> Self {
        Self { inner: 0 }
    }

    /// Update the sum by adding the contents of `bytes`.
    ///
    /// Only the final chunk fed to a sum may have odd length.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.inner = csum_add(self.inner, bytes);
    }

    /// Create a new rolling checksum, starting with the passed in
    /// `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        Self { inner: csum_add(0, bytes) }
    }

    /// Finalize the sum by adding up all the accumulated carries and
    /// returning the resulting value as a `u16`.
    pub fn finalize(&mut self) -> u16 {
        while (self.inner >> 16) != 0 {
            self.inner = (self.inner >> 16) + (self.inner & 0xFFFF);
        }

        (self.inner & 0xFFFF) as u16
    }
}

fn csum_add(mut csum: u32, bytes: &[u8]) -> u32 {
    let mut chunks = bytes.chunks_exact(2);

    for pair in &mut chunks {
        csum += u16::from_ne_bytes([pair[0], pair[1]]) as u32;
        // Fold early so very large inputs can't overflow the u32.
        if csum & 0x8000_0000 != 0 {
            csum = (csum >> 16) + (csum & 0xFFFF);
        }
    }

    // An odd trailing byte is padded with a zero byte on the right,
    // in network order.
    if let [last] = chunks.remainder() {
        csum += u16::from_ne_bytes([*last, 0]) as u32;
    }

    csum
}

/// Sum an ICMPv4 message, header and body.
///
/// The message is intact iff the result equals [`CSUM_OK`].
pub fn icmp4_checksum(msg: &[u8]) -> u16 {
    Checksum::compute(msg).finalize()
}

/// Sum an ICMPv6 message together with the IPv6 pseudo-header that
/// precedes it for checksum purposes: source, destination, upper-layer
/// length and a next header of 58.
///
/// The message is intact iff the result equals [`CSUM_OK`].
pub fn icmp6_checksum(src: &Ipv6Addr, dst: &Ipv6Addr, msg: &[u8]) -> u16 {
    let mut csum = Checksum::new();
    csum.add_bytes(&src.octets());
    csum.add_bytes(&dst.octets());
    csum.add_bytes(&(msg.len() as u32).to_be_bytes());
    csum.add_bytes(&[0, 0, 0, PSEUDO_NEXT_HDR_ICMPV6]);
    csum.add_bytes(msg);
    csum.finalize()
}

#[cfg(test)]
mod test {
    use super::*;

    // Echo request, id 0x1234, seq 1, 8-byte payload.
    const ECHO_V4: [u8; 16] = [
        0x08, 0x00, 0x4c, 0xa5, 0x12, 0x34, 0x00, 0x01, 0x61, 0x62, 0x63,
        0x64, 0x65, 0x66, 0x67, 0x68,
    ];

    fn fill_v4(msg: &mut [u8]) {
        msg[2..4].copy_from_slice(&[0, 0]);
        let hc = HeaderChecksum::from(Checksum::compute(msg));
        msg[2..4].copy_from_slice(&hc.bytes());
    }

    #[test]
    fn v4_valid_sums_to_all_ones() {
        let mut msg = ECHO_V4;
        fill_v4(&mut msg);
        assert_eq!(icmp4_checksum(&msg), CSUM_OK);
    }

    #[test]
    fn v4_corruption_detected() {
        let mut msg = ECHO_V4;
        fill_v4(&mut msg);
        for i in 0..msg.len() {
            let mut bad = msg;
            bad[i] ^= 0x01;
            assert_ne!(icmp4_checksum(&bad), CSUM_OK, "byte {i}");
        }
    }

    #[test]
    fn odd_length_pads_right() {
        let mut msg = [0x08, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0xab];
        fill_v4(&mut msg);
        assert_eq!(icmp4_checksum(&msg), CSUM_OK);

        // The trailing byte counts as the high byte of its word.
        let mut csum = Checksum::compute(&[0xab]);
        assert_eq!(csum.finalize(), u16::from_ne_bytes([0xab, 0]));
    }

    #[test]
    fn v6_includes_pseudo_header() {
        let src: Ipv6Addr = "fe80::1".parse().unwrap();
        let dst: Ipv6Addr = "fe80::2".parse().unwrap();
        let mut msg = [0x80, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0x01];

        let mut csum = Checksum::new();
        csum.add_bytes(&src.octets());
        csum.add_bytes(&dst.octets());
        csum.add_bytes(&(msg.len() as u32).to_be_bytes());
        csum.add_bytes(&[0, 0, 0, 58]);
        csum.add_bytes(&msg);
        msg[2..4].copy_from_slice(&HeaderChecksum::from(csum).bytes());

        assert_eq!(icmp6_checksum(&src, &dst, &msg), CSUM_OK);

        // The same bytes under a different pseudo-header must fail.
        let other: Ipv6Addr = "fe80::3".parse().unwrap();
        assert_ne!(icmp6_checksum(&src, &other, &msg), CSUM_OK);

        // And ICMPv4 rules don't apply.
        assert_ne!(icmp4_checksum(&msg), CSUM_OK);
    }
}
