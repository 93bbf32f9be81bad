// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The seams between an analyzer and the rest of the inspection
//! engine.
//!
//! The analyzer knows nothing of how events are consumed, where raw
//! packet bytes are recorded or what a signature looks like. It talks
//! to those services through the traits here, which the host
//! implements.

use super::ip::IpHdr;
use crate::api::IcmpEvent;

/// Per-packet callbacks into the host.
///
/// Only `deliver` must be implemented; the rest default to doing
/// nothing.
pub trait AnalyzerHooks {
    /// Hand a finished event to the event consumer.
    fn deliver(&mut self, event: IcmpEvent);

    /// Report a non-fatal anomaly with the packet being processed,
    /// such as `"bad_ICMP_checksum"`.
    fn weird(&mut self, _name: &'static str) {}

    /// Record the raw bytes of a message past its common header.
    fn packet_contents(&mut self, _bytes: &[u8]) {}

    /// Pass the bytes of a message past its common header on to any
    /// child analyzers. `len` is the declared length of those bytes;
    /// `data` is everything captured, which is at least `len` bytes.
    fn forward_packet(
        &mut self,
        _len: usize,
        _data: &[u8],
        _is_orig: bool,
        _seq: u64,
        _ip: &IpHdr,
    ) {
    }
}

/// A host that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHooks;

impl AnalyzerHooks for NullHooks {
    fn deliver(&mut self, _event: IcmpEvent) {}
}

/// The kind of content offered to a signature engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchKind {
    Payload,
}

/// A signature engine matching rules against a flow's payload.
///
/// Each direction of a flow is a separate endpoint: it is initialized
/// the first time that direction delivers a valid message, and every
/// initialized endpoint is finished when the flow is torn down.
pub trait RuleMatcher: Send {
    fn init_endpoint(&mut self, is_orig: bool, ip: &IpHdr, len: usize);

    /// Match `data` in the direction given.
    ///
    /// `bol` and `eol` say whether `data` starts and ends a line;
    /// `clear_state` says that no match state needs to be carried
    /// over to the next call.
    fn match_payload(
        &mut self,
        kind: MatchKind,
        data: &[u8],
        is_orig: bool,
        bol: bool,
        eol: bool,
        clear_state: bool,
    );

    fn finish_endpoint(&mut self, is_orig: bool);
}
