//! Vault lifecycle evaluation.
//!
//! Pure logic: no storage, no clock. Status is a function of the vault's
//! stored timestamps, its attestation quorum and death verification,
//! evaluated at a caller-supplied `now`. The ledger persists the result on
//! every mutating call; readers evaluate without persisting.
//!
//! # Time path
//!
//! ```text
//! last_check_in        deadline                 trigger_at
//!      |--- Active ---------|------ Warning ---------|--- Triggered
//!      0               + interval            + interval + grace
//! ```
//!
//! Both boundaries are strict: the vault is in Warning once `now` is past
//! the deadline and Triggered once `now` is past `trigger_at`. The recorded
//! trigger time is the recompute that first observes the trigger, so the
//! revoke window opens when the trigger becomes visible on the ledger.
//!
//! # Other paths
//!
//! - Guardian quorum moves Active/Warning to Triggered immediately.
//! - Oracle verification moves Active/Warning to DeathVerified, which
//!   becomes ReadyForClaim once the verification delay has elapsed.
//! - Triggered, ReadyForClaim and Claimed are never left by evaluation.

use crate::attestation::AttestationQuorum;
use crate::guardian::GuardianRegistry;
use crate::types::{DeathVerification, VaultId, VaultStatus, VaultTerms, REVOKE_WINDOW};
use heirloom_core::{Address, MetadataHash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,
    pub owner: Address,
    pub terms: VaultTerms,
    pub created_at: u64,
    pub last_check_in: u64,
    pub beneficiaries: Vec<Address>,
    pub guardians: GuardianRegistry,
    pub attestations: AttestationQuorum,
    pub metadata: MetadataHash,
    /// Status as of the last mutating call
    pub status: VaultStatus,
    pub triggered_at: Option<u64>,
    pub death: Option<DeathVerification>,
    pub claims: BTreeSet<Address>,
}

/// Outcome of evaluating a vault at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub status: VaultStatus,
    pub triggered_at: Option<u64>,
}

/// Check-in deadline and time-path trigger instant, with time remaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadlines {
    pub check_in_deadline: u64,
    pub trigger_at: u64,
    /// Seconds until the check-in deadline (0 once passed)
    pub until_deadline: u64,
    /// Seconds until the time-path trigger (0 once passed)
    pub until_trigger: u64,
}

impl Vault {
    pub fn check_in_deadline(&self) -> u64 {
        self.last_check_in
            .saturating_add(self.terms.check_in_interval())
    }

    /// Instant after which the time path triggers.
    pub fn trigger_at(&self) -> u64 {
        self.check_in_deadline()
            .saturating_add(self.terms.grace_period())
    }

    pub fn deadlines(&self, now: u64) -> Deadlines {
        let check_in_deadline = self.check_in_deadline();
        let trigger_at = self.trigger_at();
        Deadlines {
            check_in_deadline,
            trigger_at,
            until_deadline: check_in_deadline.saturating_sub(now),
            until_trigger: trigger_at.saturating_sub(now),
        }
    }

    pub fn is_beneficiary(&self, who: &Address) -> bool {
        self.beneficiaries.contains(who)
    }

    pub fn all_claimed(&self) -> bool {
        self.beneficiaries.iter().all(|b| self.claims.contains(b))
    }

    /// End of the emergency revoke window, if the vault has been triggered.
    pub fn revoke_deadline(&self) -> Option<u64> {
        self.triggered_at.map(|t| t.saturating_add(REVOKE_WINDOW))
    }

    /// When a verified death becomes claimable.
    pub fn verification_ready_at(&self, delay: u64) -> Option<u64> {
        self.death.map(|d| d.verified_at.saturating_add(delay))
    }

    /// Owner is back: fresh deadline and attestation round. Claims already
    /// made stay recorded.
    pub fn reset(&mut self, now: u64) {
        self.last_check_in = now;
        self.attestations.reset();
        self.triggered_at = None;
        self.status = VaultStatus::Active;
    }

    /// Apply [`evaluate`] and return the previous status if it changed.
    pub fn refresh(&mut self, now: u64, delay: u64) -> Option<VaultStatus> {
        let eval = evaluate(self, now, delay);
        if eval.status == self.status {
            return None;
        }
        let previous = self.status;
        self.status = eval.status;
        self.triggered_at = eval.triggered_at;
        Some(previous)
    }
}

/// Evaluate a vault's status at `now`.
///
/// `delay` is the ledger's death verification delay in seconds.
pub fn evaluate(vault: &Vault, now: u64, delay: u64) -> Evaluation {
    let stay = Evaluation {
        status: vault.status,
        triggered_at: vault.triggered_at,
    };

    match vault.status {
        VaultStatus::Triggered | VaultStatus::ReadyForClaim | VaultStatus::Claimed => stay,
        VaultStatus::DeathVerified => match vault.verification_ready_at(delay) {
            Some(ready_at) if now >= ready_at => Evaluation {
                status: VaultStatus::ReadyForClaim,
                triggered_at: vault.triggered_at,
            },
            _ => stay,
        },
        VaultStatus::Active | VaultStatus::Warning => {
            if vault.attestations.reached() {
                return Evaluation {
                    status: VaultStatus::Triggered,
                    triggered_at: Some(vault.triggered_at.unwrap_or(now)),
                };
            }
            if now > vault.trigger_at() {
                Evaluation {
                    status: VaultStatus::Triggered,
                    triggered_at: Some(now),
                }
            } else if now > vault.check_in_deadline() {
                Evaluation {
                    status: VaultStatus::Warning,
                    triggered_at: None,
                }
            } else {
                Evaluation {
                    status: VaultStatus::Active,
                    triggered_at: None,
                }
            }
        }
    }
}

/// Earliest instant a beneficiary claim could succeed if nothing else
/// happens (no check-in, no further attestations). `None` once claimed.
pub fn claimable_at(vault: &Vault, now: u64, delay: u64) -> Option<u64> {
    let eval = evaluate(vault, now, delay);
    match eval.status {
        VaultStatus::Claimed => None,
        VaultStatus::Triggered => eval.triggered_at.or(Some(now)),
        VaultStatus::DeathVerified | VaultStatus::ReadyForClaim => {
            vault.verification_ready_at(delay)
        }
        // Strict boundary: first claimable second is one past trigger_at
        VaultStatus::Active | VaultStatus::Warning => Some(vault.trigger_at().saturating_add(1)),
    }
}
