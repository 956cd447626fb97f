#![no_main]

use heirloom_shamir::{combine_shares, Share};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Split the input into share encodings on 0xFF separators and try to
    // combine whatever parses. Mismatched sets must be rejected cleanly.
    let shares: Vec<Share> = data
        .split(|&b| b == 0xFF)
        .filter_map(|chunk| Share::from_bytes(chunk).ok())
        .collect();
    let _ = combine_shares(&shares);
});
