// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use anyhow::Context;
use clap::ArgAction;
use clap::Parser;
use icmpdump::Config;
use icmpdump::Dumper;
use icmpdump::log::term_logger;
use icmpdump::log::verbosity;
use icmpdump::read_capture;
use slog::info;
use std::io::Write;
use std::path::PathBuf;

/// Analyze the ICMP traffic in a packet capture.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// A legacy pcap file of Ethernet or raw IP frames.
    pcap: PathBuf,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write events as JSON, one per line.
    #[arg(long)]
    json: bool,

    /// Don't validate ICMP checksums.
    #[arg(long)]
    ignore_checksums: bool,

    /// Include the body of every message with its event.
    #[arg(long)]
    packet_contents: bool,

    /// Log more; repeat for even more.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log = term_logger(verbosity(args.verbose));

    let mut cfg = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    cfg.analyzer.ignore_checksums |= args.ignore_checksums;
    cfg.analyzer.packet_contents |= args.packet_contents;

    let bytes = std::fs::read(&args.pcap)
        .with_context(|| format!("failed to read {}", args.pcap.display()))?;
    let (link, records) = read_capture(&bytes)
        .with_context(|| format!("failed to decode {}", args.pcap.display()))?;
    info!(log, "read capture"; "link" => ?link, "frames" => records.len());

    let stdout = std::io::stdout();
    let mut dumper = Dumper::new(cfg, args.json, &log, stdout.lock())?;
    for rec in &records {
        dumper.process(link, rec)?;
    }

    let (report, mut out) = dumper.finish();
    if !args.json {
        writeln!(out)?;
        report.print_into(&mut out)?;
    }
    out.flush()?;

    Ok(())
}
