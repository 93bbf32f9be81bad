// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Print flow summaries in a human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both icmpdump and integration tests.

use crate::api::ConnId;
use crate::engine::conn::IcmpConnDump;
use crate::engine::stat::IcmpStats;
use std::io::Write;
use tabwriter::TabWriter;

/// Print a set of dumped flows into a given writer.
pub fn print_flows_into(
    writer: &mut impl Write,
    flows: &[(ConnId, IcmpConnDump)],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(
        t,
        "FLOW\tTYPE\tCODE\tHITS\tORIG\tRESP\tPKTS OUT\tPKTS IN\tBAD CSUM"
    )?;
    write_hr(&mut t)?;
    for (id, dump) in flows {
        print_flow(&mut t, id, dump)?;
    }

    t.flush()
}

fn print_flow(
    t: &mut impl Write,
    id: &ConnId,
    dump: &IcmpConnDump,
) -> std::io::Result<()> {
    let eps = &dump.endpoints;
    writeln!(
        t,
        "{id}\t{}\t{}\t{}\t{}/{}\t{}/{}\t{}\t{}\t{}",
        dump.last_type,
        dump.last_code,
        dump.hits,
        eps.orig.state,
        eps.orig.size,
        eps.resp.state,
        eps.resp.size,
        dump.stats.pkts_orig,
        dump.stats.pkts_resp,
        dump.stats.bad_checksums,
    )
}

/// Print the counters totalled over every flow.
pub fn print_totals_into(
    writer: &mut impl Write,
    stats: &IcmpStats,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    write_hrb(&mut t)?;
    writeln!(t, "PACKETS\tEVENTS\tBAD CSUM\tRUNTS\tBYTES OUT\tBYTES IN")?;
    writeln!(
        t,
        "{}\t{}\t{}\t{}\t{}\t{}",
        stats.pkts,
        stats.events,
        stats.bad_checksums,
        stats.runts,
        stats.bytes_orig,
        stats.bytes_resp,
    )?;

    t.flush()
}

/// Output a horizontal rule in bold to the given writer.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

/// Output a horizontal rule to the given writer.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}
