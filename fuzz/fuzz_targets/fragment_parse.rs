#![no_main]

use heirloom_shamir::{Fragment, Share};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fragments arrive as JSON from guardians' inboxes and disk.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(fragment) = Fragment::from_json(s) {
            assert!(fragment.share_index >= 1 && fragment.share_index <= fragment.total);
            let json = fragment.to_json().expect("accepted fragment re-serializes");
            let _ = Fragment::from_json(&json);
        }
    }

    // Decrypted share payloads
    let _ = Share::from_bytes(data);
});
