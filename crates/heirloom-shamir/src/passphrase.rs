//! Guardian passphrase derivation
//!
//! Each guardian's share is encrypted under a passphrase derived from the
//! master secret, the guardian's email and the guardian's position in the
//! set. The owner can regenerate any passphrase (e.g. to re-send an invite)
//! without storing it; nobody without the master secret can.
//!
//! ```text
//! HMAC-SHA256(key = master_secret,
//!             "heirloom:guardian-passphrase:v1" || 0x00 || email || 0x00 || index (u32 BE))
//! ```
//!
//! The 32-byte tag is rendered as eight dash-separated groups of eight hex
//! characters so it can be read aloud or typed from an invite email.

use crate::FragmentError;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Current derivation scheme version
pub const PASSPHRASE_VERSION: u8 = 1;

const PASSPHRASE_DOMAIN: &[u8] = b"heirloom:guardian-passphrase:v1";

/// Parameters stored alongside a fragment so its passphrase can be re-derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassphraseDerivation {
    /// Derivation scheme version
    pub version: u8,
    /// Guardian position in the set at split time (0-based)
    pub guardian_index: u32,
}

impl PassphraseDerivation {
    pub fn new(guardian_index: u32) -> Self {
        Self {
            version: PASSPHRASE_VERSION,
            guardian_index,
        }
    }

    /// Re-derive the passphrase described by these parameters.
    pub fn derive(&self, master_secret: &[u8], email: &str) -> Result<Zeroizing<String>, FragmentError> {
        if self.version != PASSPHRASE_VERSION {
            return Err(FragmentError::Mismatch(format!(
                "unsupported passphrase derivation version {}",
                self.version
            )));
        }
        derive_guardian_passphrase(master_secret, email, self.guardian_index)
    }
}

/// Derive the passphrase for guardian `index` with the given email.
///
/// Deterministic: same inputs always give the same passphrase. The email is
/// trimmed and lowercased first.
pub fn derive_guardian_passphrase(
    master_secret: &[u8],
    email: &str,
    index: u32,
) -> Result<Zeroizing<String>, FragmentError> {
    if master_secret.is_empty() {
        return Err(FragmentError::InvalidGuardians("empty master secret".into()));
    }
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(FragmentError::InvalidGuardians("empty guardian email".into()));
    }

    let mut mac = HmacSha256::new_from_slice(master_secret)
        .map_err(|e| FragmentError::InvalidGuardians(e.to_string()))?;
    mac.update(PASSPHRASE_DOMAIN);
    mac.update(&[0]);
    mac.update(email.as_bytes());
    mac.update(&[0]);
    mac.update(&index.to_be_bytes());
    let tag = Zeroizing::new(mac.finalize().into_bytes().to_vec());

    let hex = Zeroizing::new(hex::encode(tag.as_slice()));
    let mut out = Zeroizing::new(String::with_capacity(hex.len() + 7));
    for (i, chunk) in hex.as_bytes().chunks(8).enumerate() {
        if i > 0 {
            out.push('-');
        }
        // chunks of ASCII hex are always valid UTF-8
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
    }
    Ok(out)
}
