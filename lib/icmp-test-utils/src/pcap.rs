// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Routines for building packet capture files.

use pcap_parser::Linktype;
use pcap_parser::ToVec;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;
use std::fs::File;
use std::io::Write;

pub const SNAPLEN: u32 = 1500;

/// Build a packet capture from a series of packets.
pub struct PcapBuilder<W: Write> {
    out: W,
    snaplen: u32,
}

impl PcapBuilder<File> {
    /// Create a new pcap builder of Ethernet frames, writing all
    /// captures to `path`.
    pub fn create(path: &str) -> Self {
        let file = File::create(path).unwrap();
        Self::new(file, Linktype::ETHERNET)
    }
}

impl PcapBuilder<Vec<u8>> {
    /// Create a new pcap builder capturing into memory.
    pub fn in_memory(network: Linktype) -> Self {
        Self::new(Vec::new(), network)
    }
}

impl<W: Write> PcapBuilder<W> {
    pub fn new(mut out: W, network: Linktype) -> Self {
        let mut hdr = PcapHeader {
            magic_number: 0xa1b2c3d4,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: SNAPLEN,
            network,
        };

        out.write_all(&hdr.to_vec().unwrap()).unwrap();

        Self { out, snaplen: SNAPLEN }
    }

    /// Add a packet to the capture, truncating it to the snaplen.
    pub fn add_pkt(&mut self, bytes: &[u8], ts_sec: u32, ts_usec: u32) {
        self.add_pkt_snapped(bytes, ts_sec, ts_usec, self.snaplen as usize);
    }

    /// Add a packet to the capture, keeping only its first `caplen`
    /// bytes.
    pub fn add_pkt_snapped(
        &mut self,
        bytes: &[u8],
        ts_sec: u32,
        ts_usec: u32,
        caplen: usize,
    ) {
        let data = &bytes[..bytes.len().min(caplen)];
        let mut block = LegacyPcapBlock {
            ts_sec,
            ts_usec,
            caplen: data.len() as u32,
            origlen: bytes.len() as u32,
            data,
        };

        self.out.write_all(&block.to_vec().unwrap()).unwrap();
    }

    pub fn finish(self) -> W {
        self.out
    }
}
