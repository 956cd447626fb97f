//! Vault parameters, identifiers and status

use crate::error::VaultError;
use heirloom_core::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds per day
pub const DAY: u64 = 86_400;

pub const MIN_CHECK_IN_INTERVAL: u64 = 30 * DAY;
pub const MAX_CHECK_IN_INTERVAL: u64 = 365 * DAY;
pub const MIN_GRACE_PERIOD: u64 = 7 * DAY;
pub const MAX_GRACE_PERIOD: u64 = 90 * DAY;

pub const MAX_BENEFICIARIES: usize = 10;
/// Address guardians required at creation
pub const ADDRESS_GUARDIANS: usize = 3;
/// Address plus email guardians
pub const MAX_GUARDIANS: usize = 5;

/// Attestations needed to trigger a vault, across both guardian kinds
pub const ATTESTATION_THRESHOLD: u32 = 2;
/// Per-guardian gap between attestations
pub const ATTESTATION_COOLDOWN: u64 = DAY;

/// How long after a trigger the owner may still revoke it
pub const REVOKE_WINDOW: u64 = 7 * DAY;

pub const MAX_DEATH_VERIFICATION_DELAY: u64 = 90 * DAY;

/// Ledger-assigned vault identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultId(pub u64);

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle status.
///
/// ```text
/// Active ⇄ Warning ──(time | quorum)──▶ Triggered ───────────────┐
///    │        │                                                  ▼
///    └────────┴──(oracle)──▶ DeathVerified ──(delay)──▶ ReadyForClaim ──▶ Claimed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaultStatus {
    Active,
    /// Check-in deadline passed, grace period running
    Warning,
    /// Grace period elapsed or guardian quorum reached
    Triggered,
    /// Oracle confirmed death; verification delay running
    DeathVerified,
    ReadyForClaim,
    /// Every beneficiary has claimed
    Claimed,
}

impl VaultStatus {
    /// Owner is presumed alive and may still check in.
    pub fn is_live(self) -> bool {
        matches!(self, VaultStatus::Active | VaultStatus::Warning)
    }

    /// Beneficiaries may claim.
    pub fn is_claimable(self) -> bool {
        matches!(self, VaultStatus::Triggered | VaultStatus::ReadyForClaim)
    }

    pub fn is_terminal(self) -> bool {
        self == VaultStatus::Claimed
    }
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VaultStatus::Active => "Active",
            VaultStatus::Warning => "Warning",
            VaultStatus::Triggered => "Triggered",
            VaultStatus::DeathVerified => "DeathVerified",
            VaultStatus::ReadyForClaim => "ReadyForClaim",
            VaultStatus::Claimed => "Claimed",
        };
        f.write_str(s)
    }
}

/// Check-in interval and grace period, fixed at creation (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultTerms {
    check_in_interval: u64,
    grace_period: u64,
}

impl VaultTerms {
    pub fn new(check_in_interval: u64, grace_period: u64) -> Result<Self, VaultError> {
        if !(MIN_CHECK_IN_INTERVAL..=MAX_CHECK_IN_INTERVAL).contains(&check_in_interval) {
            return Err(VaultError::InvalidCheckInInterval(check_in_interval));
        }
        if !(MIN_GRACE_PERIOD..=MAX_GRACE_PERIOD).contains(&grace_period) {
            return Err(VaultError::InvalidGracePeriod(grace_period));
        }
        Ok(Self {
            check_in_interval,
            grace_period,
        })
    }

    pub fn from_days(check_in_days: u64, grace_days: u64) -> Result<Self, VaultError> {
        Self::new(
            check_in_days.saturating_mul(DAY),
            grace_days.saturating_mul(DAY),
        )
    }

    pub fn check_in_interval(&self) -> u64 {
        self.check_in_interval
    }

    pub fn grace_period(&self) -> u64 {
        self.grace_period
    }

    /// Re-check bounds (used after deserializing untrusted state).
    pub fn validate(&self) -> Result<(), VaultError> {
        Self::new(self.check_in_interval, self.grace_period).map(|_| ())
    }
}

/// Oracle confirmation of the owner's death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathVerification {
    pub verified_at: u64,
    /// Oracle whose confirmation completed the verification
    pub verified_by: Address,
}
