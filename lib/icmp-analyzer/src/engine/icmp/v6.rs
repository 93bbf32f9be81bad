// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! ICMPv6 message types.

use super::MsgClass;
use super::build_table;
use crate::api::EventKind;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;
use smoltcp::wire::Icmpv6Message;

pub const DST_UNREACH: u8 = 1;
pub const PACKET_TOO_BIG: u8 = 2;
pub const TIME_EXCEEDED: u8 = 3;
pub const PARAM_PROB: u8 = 4;
pub const ECHO_REQUEST: u8 = 128;
pub const ECHO_REPLY: u8 = 129;
pub const MLD_LISTENER_QUERY: u8 = 130;
pub const MLD_LISTENER_REPORT: u8 = 131;
pub const MLD_LISTENER_REDUCTION: u8 = 132;
pub const ROUTER_SOLICIT: u8 = 133;
pub const ROUTER_ADVERT: u8 = 134;
pub const NEIGHBOR_SOLICIT: u8 = 135;
pub const NEIGHBOR_ADVERT: u8 = 136;
pub const REDIRECT: u8 = 137;
pub const ROUTER_RENUMBERING: u8 = 138;
/// Node information query and reply (RFC 4620).
pub const NI_QUERY: u8 = 139;
pub const NI_REPLY: u8 = 140;
/// Home agent address discovery request and reply (RFC 6275).
pub const HA_AD_REQUEST: u8 = 144;
pub const HA_AD_REPLY: u8 = 145;

const PAIRS: &[(u8, u8)] = &[
    (ECHO_REQUEST, ECHO_REPLY),
    (ROUTER_SOLICIT, ROUTER_ADVERT),
    (NEIGHBOR_SOLICIT, NEIGHBOR_ADVERT),
    (MLD_LISTENER_QUERY, MLD_LISTENER_REPORT),
    (NI_QUERY, NI_REPLY),
    (HA_AD_REQUEST, HA_AD_REPLY),
];

pub(crate) static COUNTERPARTS: [Option<u8>; 256] = build_table(PAIRS, &[]);

pub fn classify(ty: u8) -> MsgClass {
    match ty {
        ECHO_REQUEST => MsgClass::Echo(EventKind::EchoRequest),
        ECHO_REPLY => MsgClass::Echo(EventKind::EchoReply),

        // Error messages all quote the offending datagram the same way.
        DST_UNREACH => MsgClass::Context(EventKind::Unreachable),
        PARAM_PROB | TIME_EXCEEDED | PACKET_TOO_BIG => {
            MsgClass::Context(EventKind::ErrorMessage)
        }

        ROUTER_ADVERT | ROUTER_SOLICIT | REDIRECT | ROUTER_RENUMBERING => {
            MsgClass::Router
        }

        _ => MsgClass::Other,
    }
}

/// An ICMPv6 message type
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(from = "u8", into = "u8")]
pub struct MessageType {
    inner: Icmpv6Message,
}

impl From<MessageType> for u8 {
    fn from(mt: MessageType) -> u8 {
        u8::from(mt.inner)
    }
}

impl From<u8> for MessageType {
    fn from(val: u8) -> Self {
        Self { inner: Icmpv6Message::from(val) }
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match val_name(u8::from(*self)) {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{}", self.inner),
        }
    }
}

// Types smoltcp has no name for.
fn val_name(ty: u8) -> Option<&'static str> {
    match ty {
        ROUTER_RENUMBERING => Some("router renumbering"),
        NI_QUERY => Some("node information query"),
        NI_REPLY => Some("node information reply"),
        HA_AD_REQUEST => Some("home agent address discovery request"),
        HA_AD_REPLY => Some("home agent address discovery reply"),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::super::Counterpart;
    use super::super::counterpart;
    use super::*;
    use crate::api::IcmpVersion::V6;

    #[test]
    fn request_reply_pairs_are_involutions() {
        for &(req, reply) in PAIRS {
            let there = counterpart(V6, req, 0);
            assert_eq!(there, Counterpart { ty: reply, one_way: false });
            let back = counterpart(V6, there.ty, 0);
            assert_eq!(back, Counterpart { ty: req, one_way: false });
        }
    }

    #[test]
    fn experimental_pairs() {
        assert_eq!(counterpart(V6, 139, 0).ty, 140);
        assert_eq!(counterpart(V6, 140, 0).ty, 139);
        assert_eq!(counterpart(V6, 144, 0).ty, 145);
        assert_eq!(counterpart(V6, 145, 0).ty, 144);
    }

    #[test]
    fn one_way_returns_code() {
        for ty in [DST_UNREACH, PACKET_TOO_BIG, REDIRECT, ROUTER_RENUMBERING] {
            assert_eq!(
                counterpart(V6, ty, 4),
                Counterpart { ty: 4, one_way: true }
            );
        }
        // MLDv1 done messages have no reply.
        assert!(counterpart(V6, MLD_LISTENER_REDUCTION, 0).one_way);
    }

    #[test]
    fn dispatch() {
        assert_eq!(
            classify(ECHO_REQUEST),
            MsgClass::Echo(EventKind::EchoRequest)
        );
        assert_eq!(
            classify(PACKET_TOO_BIG),
            MsgClass::Context(EventKind::ErrorMessage)
        );
        assert_eq!(
            classify(DST_UNREACH),
            MsgClass::Context(EventKind::Unreachable)
        );
        for ty in [ROUTER_ADVERT, ROUTER_SOLICIT, REDIRECT, ROUTER_RENUMBERING]
        {
            assert_eq!(classify(ty), MsgClass::Router);
        }
        assert_eq!(classify(NEIGHBOR_SOLICIT), MsgClass::Other);
        assert_eq!(classify(MLD_LISTENER_QUERY), MsgClass::Other);
    }

    #[test]
    fn names() {
        assert_eq!(
            MessageType::from(ROUTER_RENUMBERING).to_string(),
            "router renumbering"
        );
    }
}
