#![no_main]

use heirloom_core::EncryptedBlob;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // EncryptedBlob::from_bytes must never panic, and anything it accepts
    // must carry KDF parameters within the allowed bounds.
    if let Ok(blob) = EncryptedBlob::from_bytes(data) {
        assert!(blob.params().validate().is_ok());
        let bytes = blob.to_bytes();
        assert_eq!(bytes.as_slice(), data);
        let _ = blob.plaintext_len();
    }
});
