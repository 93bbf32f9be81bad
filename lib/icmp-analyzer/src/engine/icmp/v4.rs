// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! ICMPv4 message types.

use super::MsgClass;
use super::build_table;
use crate::api::EventKind;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;
use smoltcp::wire;

pub const ECHO_REPLY: u8 = 0;
pub const DEST_UNREACH: u8 = 3;
pub const SOURCE_QUENCH: u8 = 4;
pub const REDIRECT: u8 = 5;
pub const ECHO: u8 = 8;
pub const ROUTER_ADVERT: u8 = 9;
pub const ROUTER_SOLICIT: u8 = 10;
pub const TIME_EXCEEDED: u8 = 11;
pub const PARAM_PROB: u8 = 12;
pub const TSTAMP: u8 = 13;
pub const TSTAMP_REPLY: u8 = 14;
pub const IREQ: u8 = 15;
pub const IREQ_REPLY: u8 = 16;
pub const MASK_REQ: u8 = 17;
pub const MASK_REPLY: u8 = 18;

// For the two-way messages the code is always 0 (RFC 792), so only
// the type takes part in the lookup.
const PAIRS: &[(u8, u8)] = &[
    (ECHO, ECHO_REPLY),
    (TSTAMP, TSTAMP_REPLY),
    (IREQ, IREQ_REPLY),
    (MASK_REQ, MASK_REPLY),
];

// A router advertisement is also sent unsolicited, so it doesn't
// point back at the solicitation.
const ONE_SIDED: &[(u8, u8)] = &[(ROUTER_SOLICIT, ROUTER_ADVERT)];

pub(crate) static COUNTERPARTS: [Option<u8>; 256] =
    build_table(PAIRS, ONE_SIDED);

pub fn classify(ty: u8) -> MsgClass {
    match ty {
        ECHO => MsgClass::Echo(EventKind::EchoRequest),
        ECHO_REPLY => MsgClass::Echo(EventKind::EchoReply),
        DEST_UNREACH => MsgClass::Context(EventKind::Unreachable),
        TIME_EXCEEDED => MsgClass::Context(EventKind::ErrorMessage),
        _ => MsgClass::Other,
    }
}

/// The ICMPv4 message type.
///
/// We wrap smoltcp's Icmpv4Message type so that we may provide a
/// serde implementation and a readable name. We call this "message
/// type" instead of just "message" because that's what it is: the
/// type field of the larger ICMP message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct MessageType {
    inner: wire::Icmpv4Message,
}

impl From<MessageType> for u8 {
    fn from(mt: MessageType) -> u8 {
        u8::from(mt.inner)
    }
}

impl From<u8> for MessageType {
    fn from(val: u8) -> Self {
        Self { inner: wire::Icmpv4Message::from(val) }
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}
