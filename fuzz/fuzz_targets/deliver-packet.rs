#![no_main]

use icmp_analyzer::api::AnalyzerCfg;
use icmp_analyzer::api::IcmpVersion;
use icmp_analyzer::api::Protocol;
use icmp_analyzer::engine::IcmpAnalyzer;
use icmp_analyzer::engine::IpHdr;
use icmp_analyzer::engine::NullHooks;
use icmp_analyzer::engine::icmp;
use icmp_analyzer::provider::Providers;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok((ip, msg)) = IpHdr::parse(data) else {
        return;
    };
    let vsn = match (&ip, ip.proto()) {
        (_, Protocol::ICMP) => IcmpVersion::V4,
        (IpHdr::V6(_), Protocol::ICMPv6) => IcmpVersion::V6,
        _ => return,
    };

    let ty = msg.first().copied().unwrap_or(0);
    let code = msg.get(1).copied().unwrap_or(0);
    let id = icmp::conn_id(vsn, ip.src(), ip.dst(), ty, code);
    let cfg = AnalyzerCfg { ignore_checksums: true, ..Default::default() };
    let mut a = IcmpAnalyzer::new(id, cfg, Providers::null(), None);

    let len = ip.payload_len().min(msg.len());
    a.deliver_packet(len, msg, true, 0, &ip, &mut NullHooks).unwrap();
});
