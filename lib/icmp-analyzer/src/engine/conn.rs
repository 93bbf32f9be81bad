// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! An ICMP flow as the connection framework sees it.

use super::analyzer::AnalyzerError;
use super::analyzer::IcmpAnalyzer;
use super::flow_table::Dump;
use super::flow_table::Ttl;
use super::hooks::AnalyzerHooks;
use super::hooks::RuleMatcher;
use super::ip::IpHdr;
use super::stat::IcmpStats;
use super::time::Moment;
use crate::api::AnalyzerCfg;
use crate::api::ConnEndpoints;
use crate::api::ConnId;
use crate::api::IcmpSummary;
use crate::provider::Providers;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// A tracked ICMP flow: its analyzer plus the times it was opened
/// and last saw a valid message.
#[derive(Debug)]
pub struct IcmpConn {
    analyzer: IcmpAnalyzer,
    start: Moment,
    last: Moment,
}

impl IcmpConn {
    pub fn new(
        id: ConnId,
        cfg: AnalyzerCfg,
        providers: Providers,
        matcher: Option<Box<dyn RuleMatcher>>,
        now: Moment,
    ) -> Self {
        Self {
            analyzer: IcmpAnalyzer::new(id, cfg, providers, matcher),
            start: now,
            last: now,
        }
    }

    pub fn id(&self) -> &ConnId {
        self.analyzer.conn()
    }

    pub fn analyzer(&self) -> &IcmpAnalyzer {
        &self.analyzer
    }

    pub fn start(&self) -> Moment {
        self.start
    }

    pub fn last(&self) -> Moment {
        self.last
    }

    /// How long the flow may sit idle before it is torn down.
    pub fn inactivity_ttl(&self) -> Ttl {
        Ttl::new_seconds(self.analyzer.cfg().inactivity_timeout_secs)
    }

    /// Deliver a packet captured at `now` to the flow's analyzer.
    ///
    /// Returns whether the analyzer accepted the message. The flow's
    /// last-seen time only moves for accepted messages.
    #[allow(clippy::too_many_arguments)]
    pub fn deliver_packet(
        &mut self,
        now: Moment,
        len: usize,
        data: &[u8],
        is_orig: bool,
        seq: u64,
        ip: &IpHdr,
        hooks: &mut dyn AnalyzerHooks,
    ) -> Result<bool, AnalyzerError> {
        let before = accepted(self.analyzer.stats());
        self.analyzer.deliver_packet(len, data, is_orig, seq, ip, hooks)?;
        let ok = accepted(self.analyzer.stats()) > before;
        if ok {
            self.last = self.last.max(now);
        }
        Ok(ok)
    }

    /// ICMP has no connection reuse: a packet matching an existing
    /// flow always belongs to it.
    pub fn is_reuse(&self, _data: &[u8]) -> bool {
        false
    }

    /// Report both endpoints to the connection framework.
    pub fn update_conn_val(&self) -> ConnEndpoints {
        self.analyzer.endpoint_summary()
    }

    /// Tear the flow down.
    pub fn done(&mut self) {
        self.analyzer.done();
    }

    /// A one-line description of the flow, using the type and code of
    /// its latest message.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

fn accepted(stats: &IcmpStats) -> u64 {
    stats.pkts_orig + stats.pkts_resp
}

impl Display for IcmpConn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let id = self.id();
        let (ty, code) = self.analyzer.last_type_code();
        write!(
            f,
            "{}({}) {}.{ty}.{code} -> {}",
            self.start, self.last, id.src, id.dst
        )
    }
}

/// The external view of an [`IcmpConn`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IcmpConnDump {
    pub hits: u64,
    pub start: Moment,
    pub last: Moment,
    pub last_type: u8,
    pub last_code: u8,
    pub endpoints: ConnEndpoints,
    pub summary: Option<IcmpSummary>,
    pub stats: IcmpStats,
}

impl Dump for IcmpConn {
    type DumpVal = IcmpConnDump;

    fn dump(&self, hits: u64) -> IcmpConnDump {
        let (last_type, last_code) = self.analyzer.last_type_code();
        IcmpConnDump {
            hits,
            start: self.start,
            last: self.last,
            last_type,
            last_code,
            endpoints: self.update_conn_val(),
            summary: self.analyzer.cached_summary().map(|s| (**s).clone()),
            stats: *self.analyzer.stats(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::EndpointStatus;
    use crate::api::IcmpVersion;
    use crate::api::Protocol;
    use crate::engine::checksum::Checksum;
    use crate::engine::checksum::HeaderChecksum;
    use crate::engine::hooks::NullHooks;
    use crate::engine::icmp;
    use crate::engine::icmp::v4;
    use crate::engine::ip::Ipv4Meta;
    use std::net::Ipv4Addr;

    const A: Ipv4Addr = Ipv4Addr::new(192, 168, 2, 10);
    const B: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

    fn echo(ty: u8) -> Vec<u8> {
        let mut msg = vec![ty, 0, 0, 0, 0, 7, 0, 1, 1, 2, 3, 4];
        let csum = HeaderChecksum::from(Checksum::compute(&msg));
        msg[2..4].copy_from_slice(&csum.bytes());
        msg
    }

    fn ip(src: Ipv4Addr, dst: Ipv4Addr) -> IpHdr {
        IpHdr::from(Ipv4Meta {
            src,
            dst,
            proto: Protocol::ICMP,
            hdr_len: 20,
            total_len: 32,
        })
    }

    #[test]
    fn describe_and_reuse() {
        let id =
            icmp::conn_id(IcmpVersion::V4, A.into(), B.into(), v4::ECHO, 0);
        let t0 = Moment::from_timeval(100, 0);
        let cfg = AnalyzerCfg::default();
        let mut conn = IcmpConn::new(id, cfg, Providers::null(), None, t0);
        assert_eq!(
            conn.describe(),
            "100.000000(100.000000) 192.168.2.10.0.0 -> 8.8.8.8"
        );
        assert_eq!(conn.inactivity_ttl().as_seconds(), 60);

        let t1 = Moment::from_timeval(100, 500_000);
        let req = echo(v4::ECHO);
        let ok = conn
            .deliver_packet(t1, 12, &req, true, 0, &ip(A, B), &mut NullHooks)
            .unwrap();
        assert!(ok);
        assert_eq!(
            conn.describe(),
            "100.000000(100.500000) 192.168.2.10.8.0 -> 8.8.8.8"
        );
        assert!(!conn.is_reuse(&req));

        // A corrupt message doesn't count as activity.
        let mut bad = echo(v4::ECHO_REPLY);
        bad[11] = 0;
        let t2 = Moment::from_timeval(130, 0);
        let ok = conn
            .deliver_packet(t2, 12, &bad, false, 1, &ip(B, A), &mut NullHooks)
            .unwrap();
        assert!(!ok);
        assert_eq!(conn.last(), t1);
        assert_eq!(conn.analyzer().last_type_code(), (v4::ECHO, 0));

        let eps = conn.update_conn_val();
        assert_eq!(eps.orig.state, EndpointStatus::Active);
        assert_eq!(eps.orig.size, 12);
        assert_eq!(eps.resp.state, EndpointStatus::Inactive);

        let dump = conn.dump(2);
        assert_eq!(dump.hits, 2);
        assert_eq!(dump.last_type, v4::ECHO);
        assert_eq!(dump.stats.bad_checksums, 1);
        assert_eq!(dump.summary.map(|s| s.itype), Some(v4::ECHO));

        conn.done();
        assert!(conn.dump(2).summary.is_none());
    }
}
