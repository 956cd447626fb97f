#![no_main]

use heirloom_core::{recover_binding_signer, Address, BindingSignature, EmailHash};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Attestation signatures are attacker-supplied: parsing and recovery
    // must return Ok or Err, never panic.
    if let Ok(sig) = BindingSignature::from_slice(data) {
        let _ = recover_binding_signer(1, &EmailHash::from_email("fuzz@example.com"), &sig);
    }

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = s.parse::<Address>();
        let _ = s.parse::<EmailHash>();
        let _ = s.parse::<BindingSignature>();
    }
});
