// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Demultiplex captured packets to ICMP flows and report on them.

use crate::capture::LinkType;
use crate::capture::Record;
use crate::config::Config;
use crate::log::SlogLog;
use anyhow::Context;
use icmp_analyzer::api::AnalyzerCfg;
use icmp_analyzer::api::ConnId;
use icmp_analyzer::api::IcmpEvent;
use icmp_analyzer::api::IcmpVersion;
use icmp_analyzer::api::Protocol;
use icmp_analyzer::engine::AnalyzerHooks;
use icmp_analyzer::engine::IcmpConn;
use icmp_analyzer::engine::IpHdr;
use icmp_analyzer::engine::conn::IcmpConnDump;
use icmp_analyzer::engine::flow_table::Dump;
use icmp_analyzer::engine::flow_table::FlowTable;
use icmp_analyzer::engine::flow_table::Ttl;
use icmp_analyzer::engine::icmp;
use icmp_analyzer::engine::stat::IcmpStats;
use icmp_analyzer::engine::time::Moment;
use icmp_analyzer::print::print_flows_into;
use icmp_analyzer::print::print_totals_into;
use icmp_analyzer::print::write_hrb;
use icmp_analyzer::provider::Providers;
use serde::Serialize;
use slog::Logger;
use slog::debug;
use slog::o;
use slog::trace;
use slog::warn;
use std::collections::BTreeMap;
use std::io::Write;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Collects what the analyzer raises for one packet.
struct EventSink<'a> {
    log: &'a Logger,
    events: Vec<IcmpEvent>,
    weirds: Vec<&'static str>,
    contents: Option<Vec<u8>>,
}

impl<'a> EventSink<'a> {
    fn new(log: &'a Logger) -> Self {
        Self { log, events: Vec::new(), weirds: Vec::new(), contents: None }
    }
}

impl AnalyzerHooks for EventSink<'_> {
    fn deliver(&mut self, event: IcmpEvent) {
        self.events.push(event);
    }

    fn weird(&mut self, name: &'static str) {
        debug!(self.log, "weird"; "name" => name);
        self.weirds.push(name);
    }

    fn packet_contents(&mut self, bytes: &[u8]) {
        self.contents = Some(bytes.to_vec());
    }
}

/// One line of JSON output.
#[derive(Serialize)]
struct JsonLine<'a> {
    ts: Moment,
    #[serde(flatten)]
    event: &'a IcmpEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    contents: Option<String>,
}

/// Everything left once the capture has been read.
#[derive(Debug, Default)]
pub struct Report {
    /// Flows in the order they were torn down.
    pub flows: Vec<(ConnId, IcmpConnDump)>,
    pub totals: IcmpStats,
    pub weirds: BTreeMap<&'static str, u64>,
    /// Frames that were not ICMP, or not usable.
    pub skipped: u64,
}

impl Report {
    pub fn print_into(&self, writer: &mut impl Write) -> std::io::Result<()> {
        print_flows_into(writer, &self.flows)?;
        print_totals_into(writer, &self.totals)?;

        if !self.weirds.is_empty() {
            write_hrb(writer)?;
            for (name, count) in &self.weirds {
                writeln!(writer, "{name}: {count}")?;
            }
        }

        writeln!(writer, "skipped frames: {}", self.skipped)
    }
}

/// Feeds captured frames through per-flow ICMP analyzers, writing
/// each event raised to `out`.
pub struct Dumper<W: Write> {
    cfg: AnalyzerCfg,
    json: bool,
    providers: Providers,
    log: Logger,
    flows: FlowTable<IcmpConn>,
    report: Report,
    seq: u64,
    out: W,
}

impl<W: Write> Dumper<W> {
    pub fn new(
        cfg: Config,
        json: bool,
        log: &Logger,
        out: W,
    ) -> anyhow::Result<Self> {
        let limit = NonZeroU32::new(cfg.flow_table.max_flows)
            .context("flow_table.max_flows must be non-zero")?;
        let ttl = Ttl::new_seconds(cfg.analyzer.inactivity_timeout_secs);
        let providers = Providers::new(Arc::new(SlogLog::new(log)));

        Ok(Self {
            cfg: cfg.analyzer,
            json,
            providers,
            log: log.new(o!("component" => "dumper")),
            flows: FlowTable::new(limit, Some(ttl)),
            report: Report::default(),
            seq: 0,
            out,
        })
    }

    pub fn num_flows(&self) -> u32 {
        self.flows.num_flows()
    }

    /// Process one captured frame.
    ///
    /// Frames that carry no ICMP message are counted and skipped.
    pub fn process(
        &mut self,
        link: LinkType,
        rec: &Record<'_>,
    ) -> anyhow::Result<()> {
        let now = rec.ts;
        self.expire(now);

        let Some(datagram) = link.ip_datagram(rec.data) else {
            trace!(self.log, "not IP"; "len" => rec.data.len());
            self.report.skipped += 1;
            return Ok(());
        };

        let (ip, msg) = match IpHdr::parse(datagram) {
            Ok(v) => v,
            Err(e) => {
                debug!(self.log, "undecodable IP header"; "err" => %e);
                self.report.skipped += 1;
                return Ok(());
            }
        };

        let vsn = match (&ip, ip.proto()) {
            (_, Protocol::ICMP) => IcmpVersion::V4,
            (IpHdr::V6(_), Protocol::ICMPv6) => IcmpVersion::V6,
            (_, proto) => {
                trace!(self.log, "not ICMP"; "proto" => %proto);
                self.report.skipped += 1;
                return Ok(());
            }
        };

        let len = ip.payload_len();
        if msg.len() < len {
            warn!(
                self.log, "ICMP message cut short by capture";
                "len" => len, "caplen" => msg.len()
            );
            self.report.skipped += 1;
            return Ok(());
        }

        let ty = msg.first().copied().unwrap_or(0);
        let code = msg.get(1).copied().unwrap_or(0);
        let id = icmp::conn_id(vsn, ip.src(), ip.dst(), ty, code);
        let Some((key, is_orig)) = self.lookup(id, now) else {
            self.report.skipped += 1;
            return Ok(());
        };

        let seq = self.seq;
        self.seq += 1;

        let mut sink = EventSink::new(&self.log);
        let entry = self
            .flows
            .get_mut(&key)
            .with_context(|| format!("flow {key} vanished"))?;
        let accepted = entry
            .state_mut()
            .deliver_packet(now, len, msg, is_orig, seq, &ip, &mut sink)
            .with_context(|| format!("flow {key}"))?;
        // Rejected messages don't keep a flow alive.
        if accepted {
            entry.hit(now);
        }

        let EventSink { events, weirds, contents, .. } = sink;
        for name in weirds {
            *self.report.weirds.entry(name).or_default() += 1;
        }
        self.write_events(now, &events, contents.as_deref())?;
        Ok(())
    }

    /// Find the flow `id` belongs to and which side sent it, creating
    /// the flow if need be.
    fn lookup(&mut self, id: ConnId, now: Moment) -> Option<(ConnId, bool)> {
        if self.flows.get(&id).is_some() {
            return Some((id, true));
        }

        let mirror = id.mirror();
        if self.flows.get(&mirror).is_some() {
            return Some((mirror, false));
        }

        let cfg = self.cfg.clone();
        let conn = IcmpConn::new(id, cfg, self.providers.clone(), None, now);
        match self.flows.add(id, conn, now) {
            Ok(_) => {
                debug!(self.log, "new flow"; "flow" => %id);
                Some((id, true))
            }
            Err(e) => {
                warn!(self.log, "dropping packet"; "flow" => %id, "err" => %e);
                None
            }
        }
    }

    fn write_events(
        &mut self,
        ts: Moment,
        events: &[IcmpEvent],
        contents: Option<&[u8]>,
    ) -> anyhow::Result<()> {
        let hex = contents.map(hex);

        for event in events {
            if self.json {
                let line = JsonLine { ts, event, contents: hex.clone() };
                serde_json::to_writer(&mut self.out, &line)?;
                writeln!(self.out)?;
            } else {
                writeln!(self.out, "{ts} {event}")?;
                if let Some(hex) = &hex {
                    writeln!(self.out, "    contents: {hex}")?;
                }
            }
        }

        Ok(())
    }

    fn expire(&mut self, now: Moment) {
        for (id, conn) in self.flows.expire_flows(now) {
            debug!(self.log, "flow expired"; "flow" => %id);
            self.close(id, conn);
        }
    }

    fn close(&mut self, id: ConnId, mut conn: IcmpConn) {
        let stats = *conn.analyzer().stats();
        let dump = conn.dump(stats.pkts);
        conn.done();

        self.report.totals += &stats;
        self.report.flows.push((id, dump));
    }

    /// Tear down every remaining flow and hand back the report along
    /// with the output.
    pub fn finish(mut self) -> (Report, W) {
        for (id, conn) in self.flows.drain() {
            self.close(id, conn);
        }

        (self.report, self.out)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use icmp_analyzer::api::EndpointStatus;
    use icmp_analyzer::api::TransportProto;
    use icmp_analyzer::engine::icmp::v4;
    use icmp_test_utils::IcmpEchoType;
    use icmp_test_utils::IcmpPkt;
    use icmp_test_utils::gen_icmpv4_echo;
    use icmp_test_utils::gen_icmpv6_echo;
    use icmp_test_utils::ipv4_datagram;
    use icmp_test_utils::udp_hdr;
    use std::net::Ipv4Addr;
    use std::net::Ipv6Addr;

    const A: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const B: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    fn null_log() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    fn dumper(cfg: Config, json: bool) -> Dumper<Vec<u8>> {
        Dumper::new(cfg, json, &null_log(), Vec::new()).unwrap()
    }

    fn feed(d: &mut Dumper<Vec<u8>>, pkt: &IcmpPkt, secs: u32) {
        let frame = pkt.eth_frame();
        let rec = Record {
            ts: Moment::from_timeval(secs, 0),
            origlen: frame.len() as u32,
            data: &frame,
        };
        d.process(LinkType::Ethernet, &rec).unwrap();
    }

    fn ping(seq: u16) -> [IcmpPkt; 2] {
        [
            gen_icmpv4_echo(IcmpEchoType::Req, A, B, 7, seq, b"ping"),
            gen_icmpv4_echo(IcmpEchoType::Reply, B, A, 7, seq, b"ping"),
        ]
    }

    #[test]
    fn ping_is_one_flow() {
        let mut d = dumper(Config::default(), false);
        for (i, pkt) in ping(1).iter().enumerate() {
            feed(&mut d, pkt, 1 + i as u32);
        }
        assert_eq!(d.num_flows(), 1);

        let (report, out) = d.finish();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1.000000 icmp_echo_request"));
        assert!(lines[1].starts_with("2.000000 icmp_echo_reply"));

        assert_eq!(report.flows.len(), 1);
        let (id, dump) = &report.flows[0];
        assert_eq!(id.src, A);
        assert_eq!(id.proto, TransportProto::Icmp);
        assert_eq!(dump.endpoints.orig.state, EndpointStatus::Active);
        assert_eq!(dump.endpoints.resp.state, EndpointStatus::Active);
        assert_eq!(report.totals.pkts, 2);
        assert_eq!(report.totals.events, 2);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn flows_expire_on_capture_time() {
        let mut d = dumper(Config::default(), false);
        let [req, reply] = ping(1);
        feed(&mut d, &req, 1);
        feed(&mut d, &reply, 2);
        // Quiet for longer than the inactivity timeout.
        let [req, _] = ping(2);
        feed(&mut d, &req, 100);
        assert_eq!(d.num_flows(), 1);

        let (report, _) = d.finish();
        assert_eq!(report.flows.len(), 2);
        assert_eq!(report.flows[0].1.stats.pkts, 2);
        assert_eq!(report.flows[1].1.stats.pkts, 1);
        assert_eq!(report.totals.pkts, 3);
    }

    #[test]
    fn corrupt_messages_dont_keep_a_flow_alive() {
        let mut d = dumper(Config::default(), false);
        let [req, _] = ping(1);
        feed(&mut d, &req, 1);
        let [mut bad, _] = ping(2);
        bad.corrupt(2);
        feed(&mut d, &bad, 50);
        let [req, _] = ping(3);
        feed(&mut d, &req, 100);

        let (report, _) = d.finish();
        assert_eq!(report.flows.len(), 2);
        assert_eq!(report.flows[0].1.stats.bad_checksums, 1);
        assert_eq!(report.flows[1].1.stats.bad_checksums, 0);
        assert_eq!(report.flows[1].1.stats.pkts, 1);
    }

    #[test]
    fn non_icmp_is_skipped() {
        let mut d = dumper(Config::default(), false);
        let udp = udp_hdr(53, 5353, 0);
        let datagram = ipv4_datagram(A, B, 17, &udp);
        let rec =
            Record { ts: Moment::default(), origlen: 28, data: &datagram };
        d.process(LinkType::Raw, &rec).unwrap();
        d.process(LinkType::Raw, &Record { data: &[0x45], ..rec }).unwrap();

        assert_eq!(d.num_flows(), 0);
        let (report, out) = d.finish();
        assert!(out.is_empty());
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn bad_checksum_is_counted() {
        let mut d = dumper(Config::default(), false);
        let [mut req, _] = ping(1);
        req.corrupt(2);
        feed(&mut d, &req, 1);

        let (report, out) = d.finish();
        assert!(out.is_empty());
        assert_eq!(report.weirds.get("bad_ICMP_checksum"), Some(&1));
        assert_eq!(report.totals.bad_checksums, 1);

        let mut text = Vec::new();
        report.print_into(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("bad_ICMP_checksum: 1"));
    }

    #[test]
    fn json_output() {
        let mut cfg = Config::default();
        cfg.analyzer.packet_contents = true;
        let mut d = dumper(cfg, true);
        let src = Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1);
        let dst = Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 2);
        let req = gen_icmpv6_echo(IcmpEchoType::Req, src, dst, 1, 1, b"AB");
        feed(&mut d, &req, 5);

        let (_, out) = d.finish();
        let line: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(line["event"], "icmp_echo_request");
        assert_eq!(line["icmp"]["v6"], true);
        assert_eq!(line["contents"], "4142");
        assert_eq!(line["ts"]["micros"], 5_000_000);
    }

    #[test]
    fn flow_limit() {
        let mut cfg = Config::default();
        cfg.flow_table.max_flows = 1;
        let mut d = dumper(cfg, false);
        let [req, _] = ping(1);
        feed(&mut d, &req, 1);
        let other = gen_icmpv4_echo(IcmpEchoType::Req, B, A, 9, 1, b"");
        feed(&mut d, &other, 2);

        assert_eq!(d.num_flows(), 1);
        let (report, _) = d.finish();
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn zero_flows_is_an_error() {
        let mut cfg = Config::default();
        cfg.flow_table.max_flows = 0;
        assert!(Dumper::new(cfg, false, &null_log(), Vec::new()).is_err());
    }

    #[test]
    fn unreachable_goes_to_its_own_flow() {
        let mut d = dumper(Config::default(), false);
        let quoted = ipv4_datagram(A, B, 17, &udp_hdr(5000, 53, 0));
        let unreach = icmp_test_utils::gen_icmpv4_unreach(B, A, 3, &quoted);
        feed(&mut d, &unreach, 1);

        let (report, out) = d.finish();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("icmp_unreachable"));
        let (id, _) = &report.flows[0];
        assert_eq!(id.src_port, u16::from(v4::DEST_UNREACH));
        // One-way: the code stands in for the counterpart.
        assert_eq!(id.dst_port, 3);
    }
}
