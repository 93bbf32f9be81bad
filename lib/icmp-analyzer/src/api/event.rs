// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::record::ConnId;
use super::record::ContextRecord;
use super::record::IcmpSummary;
use bitflags::bitflags;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

/// The kinds of event the analyzer can raise.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Sent,
    EchoRequest,
    EchoReply,
    RouterAdvertisement,
    Unreachable,
    ErrorMessage,
}

impl EventKind {
    /// The name the event is delivered under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sent => "icmp_sent",
            Self::EchoRequest => "icmp_echo_request",
            Self::EchoReply => "icmp_echo_reply",
            Self::RouterAdvertisement => "icmp_router_advertisement",
            Self::Unreachable => "icmp_unreachable",
            Self::ErrorMessage => "icmp_error_message",
        }
    }

    pub fn mask(&self) -> EventMask {
        match self {
            Self::Sent => EventMask::SENT,
            Self::EchoRequest => EventMask::ECHO_REQUEST,
            Self::EchoReply => EventMask::ECHO_REPLY,
            Self::RouterAdvertisement => EventMask::ROUTER_ADVERTISEMENT,
            Self::Unreachable => EventMask::UNREACHABLE,
            Self::ErrorMessage => EventMask::ERROR_MESSAGE,
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

bitflags! {
    /// The set of event kinds a consumer has subscribed to.
    ///
    /// A handler whose event kind is absent does no work at all.
    #[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
    #[serde(transparent)]
    pub struct EventMask: u8 {
        const SENT = 1 << 0;
        const ECHO_REQUEST = 1 << 1;
        const ECHO_REPLY = 1 << 2;
        const ROUTER_ADVERTISEMENT = 1 << 3;
        const UNREACHABLE = 1 << 4;
        const ERROR_MESSAGE = 1 << 5;
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::all()
    }
}

impl EventMask {
    pub fn wants(&self, kind: EventKind) -> bool {
        self.contains(kind.mask())
    }
}

/// A structured event handed to the event consumer.
///
/// The summary is the flow's cached [`IcmpSummary`]; every event of a
/// flow points at the same allocation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum IcmpEvent {
    #[serde(rename = "icmp_sent")]
    Sent { conn: ConnId, icmp: Arc<IcmpSummary> },

    #[serde(rename = "icmp_echo_request")]
    EchoRequest {
        conn: ConnId,
        icmp: Arc<IcmpSummary>,
        id: u16,
        seq: u16,
        payload: Vec<u8>,
    },

    #[serde(rename = "icmp_echo_reply")]
    EchoReply {
        conn: ConnId,
        icmp: Arc<IcmpSummary>,
        id: u16,
        seq: u16,
        payload: Vec<u8>,
    },

    #[serde(rename = "icmp_router_advertisement")]
    RouterAdvertisement { conn: ConnId, icmp: Arc<IcmpSummary> },

    #[serde(rename = "icmp_unreachable")]
    Unreachable {
        conn: ConnId,
        icmp: Arc<IcmpSummary>,
        code: u8,
        context: ContextRecord,
    },

    #[serde(rename = "icmp_error_message")]
    ErrorMessage {
        conn: ConnId,
        icmp: Arc<IcmpSummary>,
        code: u8,
        context: ContextRecord,
    },
}

impl IcmpEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Sent { .. } => EventKind::Sent,
            Self::EchoRequest { .. } => EventKind::EchoRequest,
            Self::EchoReply { .. } => EventKind::EchoReply,
            Self::RouterAdvertisement { .. } => EventKind::RouterAdvertisement,
            Self::Unreachable { .. } => EventKind::Unreachable,
            Self::ErrorMessage { .. } => EventKind::ErrorMessage,
        }
    }

    pub fn conn(&self) -> &ConnId {
        match self {
            Self::Sent { conn, .. }
            | Self::EchoRequest { conn, .. }
            | Self::EchoReply { conn, .. }
            | Self::RouterAdvertisement { conn, .. }
            | Self::Unreachable { conn, .. }
            | Self::ErrorMessage { conn, .. } => conn,
        }
    }

    pub fn summary(&self) -> &Arc<IcmpSummary> {
        match self {
            Self::Sent { icmp, .. }
            | Self::EchoRequest { icmp, .. }
            | Self::EchoReply { icmp, .. }
            | Self::RouterAdvertisement { icmp, .. }
            | Self::Unreachable { icmp, .. }
            | Self::ErrorMessage { icmp, .. } => icmp,
        }
    }
}

impl Display for IcmpEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {{{}}}", self.kind(), self.conn(), self.summary())?;

        match self {
            Self::EchoRequest { id, seq, payload, .. }
            | Self::EchoReply { id, seq, payload, .. } => {
                write!(f, " id={id} seq={seq} payload={}B", payload.len())
            }

            Self::Unreachable { code, context, .. }
            | Self::ErrorMessage { code, context, .. } => {
                write!(f, " code={code} context={context}")
            }

            Self::Sent { .. } | Self::RouterAdvertisement { .. } => Ok(()),
        }
    }
}
