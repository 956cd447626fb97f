//! Attestation quorum
//!
//! One counter per vault, shared by address and email guardians. Each
//! guardian counts at most once until the next reset, and may not attest
//! again within the cooldown measured from their own last attestation.
//!
//! A reset (owner check-in or emergency revoke) clears every guardian's
//! flag and the counter at once. Last-attestation timestamps survive the
//! reset, so the cooldown cannot be sidestepped by an owner reset.

use crate::error::VaultError;
use crate::guardian::GuardianId;
use crate::types::{ATTESTATION_COOLDOWN, ATTESTATION_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-guardian attestation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRecord {
    /// Counted since the last reset
    pub has_attested: bool,
    pub last_attested_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationQuorum {
    threshold: u32,
    cooldown: u64,
    count: u32,
    records: BTreeMap<GuardianId, AttestationRecord>,
}

impl Default for AttestationQuorum {
    fn default() -> Self {
        Self::new(ATTESTATION_THRESHOLD, ATTESTATION_COOLDOWN)
    }
}

impl AttestationQuorum {
    pub fn new(threshold: u32, cooldown: u64) -> Self {
        Self {
            threshold,
            cooldown,
            count: 0,
            records: BTreeMap::new(),
        }
    }

    /// Count an attestation from `guardian`. Returns the new count.
    ///
    /// Authorization is the caller's job; this only enforces the
    /// once-per-round and cooldown rules.
    pub fn attest(&mut self, guardian: GuardianId, now: u64) -> Result<u32, VaultError> {
        let record = self.records.entry(guardian).or_default();
        if record.has_attested {
            return Err(VaultError::AlreadyAttested);
        }
        if let Some(last) = record.last_attested_at {
            let retry_at = last.saturating_add(self.cooldown);
            if now < retry_at {
                return Err(VaultError::AttestationCooldown { retry_at });
            }
        }
        record.has_attested = true;
        record.last_attested_at = Some(now);
        self.count += 1;
        Ok(self.count)
    }

    pub fn reached(&self) -> bool {
        self.count >= self.threshold
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn record(&self, guardian: &GuardianId) -> AttestationRecord {
        self.records.get(guardian).copied().unwrap_or_default()
    }

    /// Guardians counted since the last reset.
    pub fn attested(&self) -> impl Iterator<Item = &GuardianId> {
        self.records
            .iter()
            .filter(|(_, r)| r.has_attested)
            .map(|(id, _)| id)
    }

    /// Zero the counter and every guardian's flag; keep timestamps.
    pub fn reset(&mut self) {
        self.count = 0;
        for record in self.records.values_mut() {
            record.has_attested = false;
        }
    }
}
