//! Encrypted guardian fragments
//!
//! A fragment is one guardian's Shamir share, encrypted under that guardian's
//! derived passphrase, plus what is needed to re-derive the passphrase. The
//! master secret and the raw shares never leave this module unencrypted.

use crate::passphrase::PassphraseDerivation;
use crate::shamir::{split_secret, SchemeParams, Share};
use crate::FragmentError;
use heirloom_core::{decrypt_bytes, encrypt_bytes, EncryptedBlob, KdfParams};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A guardian as seen by the splitter: a stable id and an invite email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianContact {
    /// Identifier the caller uses for this guardian (party record id)
    pub guardian_id: String,
    /// Email the guardian was invited with; feeds passphrase derivation
    pub email: String,
}

impl GuardianContact {
    pub fn new(guardian_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            guardian_id: guardian_id.into(),
            email: email.into(),
        }
    }
}

/// One guardian's encrypted share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub vault_id: u64,
    pub guardian_id: String,
    /// Shamir x-coordinate of the encrypted share
    pub share_index: u8,
    pub threshold: u8,
    pub total: u8,
    pub derivation: PassphraseDerivation,
    #[serde(with = "blob_base64")]
    pub encrypted_share: EncryptedBlob,
    /// Unix timestamp of generation
    pub created_at: u64,
}

/// Serde helper: EncryptedBlob as base64 of its byte encoding
mod blob_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use heirloom_core::EncryptedBlob;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(blob: &EncryptedBlob, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(blob.to_bytes()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<EncryptedBlob, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(s).map_err(serde::de::Error::custom)?;
        EncryptedBlob::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl Fragment {
    pub fn to_json(&self) -> Result<String, FragmentError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a fragment from untrusted JSON.
    pub fn from_json(s: &str) -> Result<Self, FragmentError> {
        let fragment: Fragment = serde_json::from_str(s)?;
        fragment.validate()?;
        Ok(fragment)
    }

    /// Structural checks that do not need the passphrase.
    pub fn validate(&self) -> Result<(), FragmentError> {
        SchemeParams {
            threshold: self.threshold,
            total: self.total,
        }
        .validate()?;
        if self.share_index == 0 || self.share_index > self.total {
            return Err(FragmentError::Mismatch(format!(
                "share index {} outside 1..={}",
                self.share_index, self.total
            )));
        }
        Ok(())
    }
}

fn validate_guardians(guardians: &[GuardianContact]) -> Result<(), FragmentError> {
    let mut ids = HashSet::new();
    let mut emails = HashSet::new();
    for g in guardians {
        if g.guardian_id.trim().is_empty() {
            return Err(FragmentError::InvalidGuardians("empty guardian id".into()));
        }
        if g.email.trim().is_empty() {
            return Err(FragmentError::InvalidGuardians(format!(
                "guardian {} has no email",
                g.guardian_id
            )));
        }
        if !ids.insert(g.guardian_id.as_str()) {
            return Err(FragmentError::DuplicateGuardian(g.guardian_id.clone()));
        }
        if !emails.insert(g.email.trim().to_lowercase()) {
            return Err(FragmentError::DuplicateGuardian(g.guardian_id.clone()));
        }
    }
    Ok(())
}

/// Split `master_secret` across `guardians` and encrypt each share.
///
/// All-or-nothing: either every guardian gets a fragment or an error is
/// returned and nothing is produced.
pub fn seal_fragments(
    vault_id: u64,
    master_secret: &[u8],
    guardians: &[GuardianContact],
    kdf: KdfParams,
    now: u64,
) -> Result<Vec<Fragment>, FragmentError> {
    validate_guardians(guardians)?;
    let scheme = SchemeParams::for_guardians(guardians.len())?;
    let shares = split_secret(master_secret, scheme.threshold, scheme.total)?;

    guardians
        .iter()
        .zip(shares.iter())
        .enumerate()
        .map(|(position, (guardian, share))| {
            let derivation = PassphraseDerivation::new(position as u32);
            let passphrase = derivation.derive(master_secret, &guardian.email)?;
            let encrypted_share = encrypt_bytes(&share.to_bytes(), &passphrase, kdf)?;
            Ok(Fragment {
                vault_id,
                guardian_id: guardian.guardian_id.clone(),
                share_index: share.index,
                threshold: scheme.threshold,
                total: scheme.total,
                derivation,
                encrypted_share,
                created_at: now,
            })
        })
        .collect()
}

/// Decrypt a fragment with the guardian's passphrase.
///
/// The decrypted share must agree with the fragment's public metadata;
/// a mismatch means the fragment was tampered with or mislabelled.
pub fn open_fragment(fragment: &Fragment, passphrase: &str) -> Result<Share, FragmentError> {
    fragment.validate()?;
    let plaintext = decrypt_bytes(&fragment.encrypted_share, passphrase)?;
    let share = Share::from_bytes(&plaintext)?;

    if share.index != fragment.share_index || share.threshold != fragment.threshold {
        return Err(FragmentError::Mismatch(format!(
            "fragment for {} decrypts to share {} (threshold {})",
            fragment.guardian_id, share.index, share.threshold
        )));
    }
    Ok(share)
}
