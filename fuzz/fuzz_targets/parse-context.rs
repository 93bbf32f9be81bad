#![no_main]

use icmp_analyzer::api::IcmpVersion;
use icmp_analyzer::engine::context;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = context::extract(IcmpVersion::V4, data);
    let _ = context::extract(IcmpVersion::V6, data);
});
