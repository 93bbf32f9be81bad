// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The per-flow ICMP analyzer.
//!
//! One [`IcmpAnalyzer`] is created per flow and is fed that flow's
//! packets, one at a time, through [`IcmpAnalyzer::deliver_packet`].
//! Each valid message produces at most one event, handed to the host
//! through [`AnalyzerHooks`].
//!
//! A packet goes through the following, in order:
//!
//! 1. Length checks: the capture must cover the declared length and
//!    the message must hold the 8-byte common header.
//! 2. Optional recording of the raw message body.
//! 3. Checksum validation, unless disabled. A bad sum drops the packet
//!    here, before any flow state is touched.
//! 4. Classification by ICMP version and type, and the handler for
//!    that class: echo, context (error messages), router, or the
//!    catch-all "sent" event.
//! 5. Forwarding of the body to child analyzers and the signature
//!    engine.

use super::checksum::CSUM_OK;
use super::checksum::icmp4_checksum;
use super::checksum::icmp6_checksum;
use super::context;
use super::endpoint::EndpointState;
use super::hooks::AnalyzerHooks;
use super::hooks::MatchKind;
use super::hooks::RuleMatcher;
use super::icmp;
use super::icmp::IcmpHdrRaw;
use super::icmp::MsgClass;
use super::icmp::v6;
use super::ip::IpHdr;
use super::stat::IcmpStats;
use crate::api::AnalyzerCfg;
use crate::api::ConnEndpoints;
use crate::api::ConnId;
use crate::api::EventKind;
use crate::api::IcmpEvent;
use crate::api::IcmpSummary;
use crate::api::IcmpVersion;
use crate::api::Protocol;
use crate::provider::LogLevel;
use crate::provider::Providers;
use core::fmt;
use std::sync::Arc;
use thiserror::Error;
use zerocopy::FromBytes;

/// A packet that should never have been handed to the analyzer.
///
/// These are breaches of the contract with whatever demultiplexes
/// packets to flows; the packet is not processed.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum AnalyzerError {
    #[error("captured {caplen} bytes of a {len}-byte message")]
    Truncated { len: usize, caplen: usize },

    #[error("unexpected IP protocol in ICMP analyzer: {0}")]
    UnexpectedProto(Protocol),
}

pub const WEIRD_BAD_CHECKSUM: &str = "bad_ICMP_checksum";
pub const WEIRD_BAD_CHECKSUM6: &str = "bad_ICMP6_checksum";
pub const WEIRD_TRUNCATED: &str = "truncated_ICMP";

/// The ICMP analyzer of a single flow.
pub struct IcmpAnalyzer {
    conn: ConnId,
    cfg: AnalyzerCfg,
    providers: Providers,

    matcher: Option<Box<dyn RuleMatcher>>,
    // Which of (orig, resp) the matcher has been initialized for.
    matcher_init: [bool; 2],

    summary: Option<Arc<IcmpSummary>>,
    last_type: u8,
    last_code: u8,

    orig: EndpointState,
    resp: EndpointState,
    stats: IcmpStats,
}

impl fmt::Debug for IcmpAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("IcmpAnalyzer")
            .field("conn", &self.conn)
            .field("cfg", &self.cfg)
            .field("matcher", &self.matcher.is_some())
            .field("summary", &self.summary)
            .field("last_type", &self.last_type)
            .field("last_code", &self.last_code)
            .field("orig", &self.orig)
            .field("resp", &self.resp)
            .field("stats", &self.stats)
            .finish()
    }
}

impl IcmpAnalyzer {
    /// Create the analyzer for the flow identified by `conn`, whose
    /// source is the originator.
    pub fn new(
        conn: ConnId,
        cfg: AnalyzerCfg,
        providers: Providers,
        matcher: Option<Box<dyn RuleMatcher>>,
    ) -> Self {
        Self {
            conn,
            cfg,
            providers,
            matcher,
            matcher_init: [false; 2],
            summary: None,
            last_type: 0,
            last_code: 0,
            orig: EndpointState::default(),
            resp: EndpointState::default(),
            stats: IcmpStats::default(),
        }
    }

    pub fn conn(&self) -> &ConnId {
        &self.conn
    }

    pub fn cfg(&self) -> &AnalyzerCfg {
        &self.cfg
    }

    /// Process one ICMP message.
    ///
    /// `len` is the declared length of the message, header included;
    /// `data` is every byte captured from the start of the message,
    /// which may run past `len` when the link layer padded the frame.
    ///
    /// # Errors
    ///
    /// Fails without touching any state if fewer than `len` bytes
    /// were captured, or if the outer header does not carry ICMP for
    /// its IP version. Damaged messages are not errors: they are
    /// reported through [`AnalyzerHooks::weird`] and skipped.
    pub fn deliver_packet(
        &mut self,
        len: usize,
        data: &[u8],
        is_orig: bool,
        seq: u64,
        ip: &IpHdr,
        hooks: &mut dyn AnalyzerHooks,
    ) -> Result<(), AnalyzerError> {
        let caplen = data.len();
        if caplen < len {
            return Err(AnalyzerError::Truncated { len, caplen });
        }

        let vsn = match (ip, ip.proto()) {
            (_, Protocol::ICMP) => IcmpVersion::V4,
            (IpHdr::V6(_), Protocol::ICMPv6) => IcmpVersion::V6,
            (_, proto) => return Err(AnalyzerError::UnexpectedProto(proto)),
        };

        self.stats.pkts += 1;

        // The declared length bounds every read of the message proper;
        // anything captured past it is link-layer padding.
        let msg = &data[..len];
        let Ok((hdr, _)) = IcmpHdrRaw::ref_from_prefix(msg) else {
            self.stats.runts += 1;
            self.providers.log.log(
                LogLevel::Warn,
                &format!("{}: truncated {vsn} message: {len} bytes", self.conn),
            );
            hooks.weird(WEIRD_TRUNCATED);
            return Ok(());
        };

        if self.cfg.packet_contents {
            hooks.packet_contents(&msg[IcmpHdrRaw::SIZE..]);
        }

        if !self.cfg.ignore_checksums && !Self::csum_ok(vsn, ip, msg) {
            self.stats.bad_checksums += 1;
            self.providers.log.log(
                LogLevel::Warn,
                &format!(
                    "{}: bad {vsn} checksum on type {} code {}",
                    self.conn, hdr.msg_type, hdr.msg_code,
                ),
            );
            hooks.weird(match vsn {
                IcmpVersion::V4 => WEIRD_BAD_CHECKSUM,
                IcmpVersion::V6 => WEIRD_BAD_CHECKSUM6,
            });
            return Ok(());
        }

        if let Some(matcher) = self.matcher.as_mut() {
            let init = &mut self.matcher_init[usize::from(!is_orig)];
            if !*init {
                matcher.init_endpoint(is_orig, ip, len);
                *init = true;
            }
        }

        self.last_type = hdr.msg_type;
        self.last_code = hdr.msg_code;
        // The length is bounded by the 16-bit IP length fields.
        let msg_len = len as u32;
        if is_orig {
            self.orig.record(msg_len);
        } else {
            self.resp.record(msg_len);
        }
        self.stats.hit(is_orig, len as u64);

        // Move past the common header.
        let body = &data[IcmpHdrRaw::SIZE..];
        let body_len = len - IcmpHdrRaw::SIZE;

        match icmp::classify(vsn, hdr.msg_type) {
            MsgClass::Echo(kind) => {
                self.echo(kind, vsn, hdr, body_len, body, hooks)
            }
            MsgClass::Context(kind) => {
                self.context(kind, vsn, hdr, body_len, body, hooks)
            }
            MsgClass::Router => self.router(hdr, body_len, hooks),
            MsgClass::Other => self.sent(vsn, hdr, body_len, hooks),
        }

        if body.len() >= body_len {
            hooks.forward_packet(body_len, body, is_orig, seq, ip);
        }

        if let Some(matcher) = self.matcher.as_mut() {
            matcher.match_payload(
                MatchKind::Payload,
                &body[..body_len],
                is_orig,
                false,
                false,
                true,
            );
        }

        Ok(())
    }

    fn csum_ok(vsn: IcmpVersion, ip: &IpHdr, msg: &[u8]) -> bool {
        let sum = match (vsn, ip) {
            (IcmpVersion::V6, IpHdr::V6(v6)) => {
                icmp6_checksum(&v6.src, &v6.dst, msg)
            }
            _ => icmp4_checksum(msg),
        };

        sum == CSUM_OK
    }

    /// The summary shared by every event of this flow, built from the
    /// message at hand if this is the first event.
    ///
    /// Once built the summary is never refreshed: later messages of
    /// the flow get the first message's type, code and length.
    fn summary(
        &mut self,
        hdr: &IcmpHdrRaw,
        len: usize,
        v6: bool,
    ) -> Arc<IcmpSummary> {
        let conn = &self.conn;
        let summary = self.summary.get_or_insert_with(|| {
            Arc::new(IcmpSummary {
                orig_h: conn.src,
                resp_h: conn.dst,
                itype: hdr.msg_type,
                icode: hdr.msg_code,
                len: len as u32,
                v6,
            })
        });

        Arc::clone(summary)
    }

    fn emit(&mut self, hooks: &mut dyn AnalyzerHooks, event: IcmpEvent) {
        self.stats.events += 1;
        hooks.deliver(event);
    }

    fn sent(
        &mut self,
        vsn: IcmpVersion,
        hdr: &IcmpHdrRaw,
        len: usize,
        hooks: &mut dyn AnalyzerHooks,
    ) {
        if !self.cfg.events.wants(EventKind::Sent) {
            return;
        }

        let icmp = self.summary(hdr, len, vsn.is_v6());
        self.emit(hooks, IcmpEvent::Sent { conn: self.conn, icmp });
    }

    fn echo(
        &mut self,
        kind: EventKind,
        vsn: IcmpVersion,
        hdr: &IcmpHdrRaw,
        len: usize,
        body: &[u8],
        hooks: &mut dyn AnalyzerHooks,
    ) {
        if !self.cfg.events.wants(kind) {
            return;
        }

        let conn = self.conn;
        let icmp = self.summary(hdr, len, vsn.is_v6());
        let id = hdr.echo_id();
        let seq = hdr.echo_seq();
        let payload = body.to_vec();

        let event = match kind {
            EventKind::EchoRequest => {
                IcmpEvent::EchoRequest { conn, icmp, id, seq, payload }
            }
            _ => IcmpEvent::EchoReply { conn, icmp, id, seq, payload },
        };
        self.emit(hooks, event);
    }

    fn router(
        &mut self,
        hdr: &IcmpHdrRaw,
        len: usize,
        hooks: &mut dyn AnalyzerHooks,
    ) {
        if hdr.msg_type != v6::ROUTER_ADVERT {
            self.sent(IcmpVersion::V6, hdr, len, hooks);
            return;
        }

        if !self.cfg.events.wants(EventKind::RouterAdvertisement) {
            return;
        }

        let icmp = self.summary(hdr, len, true);
        self.emit(
            hooks,
            IcmpEvent::RouterAdvertisement { conn: self.conn, icmp },
        );
    }

    fn context(
        &mut self,
        kind: EventKind,
        vsn: IcmpVersion,
        hdr: &IcmpHdrRaw,
        len: usize,
        body: &[u8],
        hooks: &mut dyn AnalyzerHooks,
    ) {
        if !self.cfg.events.wants(kind) {
            return;
        }

        let conn = self.conn;
        let icmp = self.summary(hdr, len, vsn.is_v6());
        let code = hdr.msg_code;
        let context = context::extract(vsn, body);

        let event = match kind {
            EventKind::Unreachable => {
                IcmpEvent::Unreachable { conn, icmp, code, context }
            }
            _ => IcmpEvent::ErrorMessage { conn, icmp, code, context },
        };
        self.emit(hooks, event);
    }

    /// The type and code of the most recent valid message, or zeros
    /// before the first.
    pub fn last_type_code(&self) -> (u8, u8) {
        (self.last_type, self.last_code)
    }

    /// The cached summary, if any event has been raised yet.
    pub fn cached_summary(&self) -> Option<&Arc<IcmpSummary>> {
        self.summary.as_ref()
    }

    /// Report both sides of the flow to the connection framework.
    pub fn endpoint_summary(&self) -> ConnEndpoints {
        ConnEndpoints { orig: self.orig.summary(), resp: self.resp.summary() }
    }

    pub fn stats(&self) -> &IcmpStats {
        &self.stats
    }

    /// Tear the analyzer down with its flow.
    ///
    /// The signature engine's endpoints are finished and the cached
    /// summary is released. Calling this more than once is harmless.
    pub fn done(&mut self) {
        if let Some(matcher) = self.matcher.as_mut() {
            for (idx, is_orig) in [(0, true), (1, false)] {
                if self.matcher_init[idx] {
                    matcher.finish_endpoint(is_orig);
                    self.matcher_init[idx] = false;
                }
            }
        }

        self.summary = None;
    }
}
