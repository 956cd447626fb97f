//! Guardian-approved key recovery with a timelock.
//!
//! The sibling of the inheritance flow for an owner who is alive but has
//! lost their key. Guardians approve a replacement key; once two have
//! approved, a fixed delay runs before anyone may execute the swap. The
//! owner can cancel at any point before execution, which is the defence
//! against colluding guardians.
//!
//! ```text
//! propose ──▶ approve ──(quorum)──▶ [delay] ──▶ execute
//!    └────────────── cancel (owner) ─────────────┘
//! ```

use crate::attestation::AttestationQuorum;
use crate::error::VaultError;
use crate::guardian::GuardianId;
use crate::types::{ATTESTATION_COOLDOWN, ATTESTATION_THRESHOLD, DAY, MAX_GUARDIANS};
use heirloom_core::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MIN_RECOVERY_DELAY: u64 = DAY;
pub const MAX_RECOVERY_DELAY: u64 = 90 * DAY;

/// A pending key replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    pub new_key: Address,
    pub proposed_by: Address,
    pub proposed_at: u64,
    pub approvals: AttestationQuorum,
    /// Set when the approval quorum is reached
    pub executable_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryTimelock {
    owner: Address,
    guardians: BTreeSet<Address>,
    delay: u64,
    pending: Option<RecoveryRequest>,
}

impl RecoveryTimelock {
    pub fn new(owner: Address, guardians: &[Address], delay: u64) -> Result<Self, VaultError> {
        if owner.is_zero() {
            return Err(VaultError::InvalidParty("owner is the zero address"));
        }
        if !(3..=MAX_GUARDIANS).contains(&guardians.len()) {
            return Err(VaultError::InvalidGuardianCount(guardians.len()));
        }
        let mut set = BTreeSet::new();
        for g in guardians {
            if g.is_zero() {
                return Err(VaultError::InvalidParty("guardian is the zero address"));
            }
            if *g == owner {
                return Err(VaultError::InvalidParty("owner cannot be a guardian"));
            }
            if !set.insert(*g) {
                return Err(VaultError::DuplicateGuardian(g.to_string()));
            }
        }
        if !(MIN_RECOVERY_DELAY..=MAX_RECOVERY_DELAY).contains(&delay) {
            return Err(VaultError::InvalidRecoveryDelay(delay));
        }
        Ok(Self {
            owner,
            guardians: set,
            delay,
            pending: None,
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn pending(&self) -> Option<&RecoveryRequest> {
        self.pending.as_ref()
    }

    fn require_guardian(&self, caller: &Address) -> Result<(), VaultError> {
        if !self.guardians.contains(caller) {
            return Err(VaultError::Unauthorized("not a recovery guardian"));
        }
        Ok(())
    }

    /// A guardian proposes `new_key`; the proposal counts as their approval.
    pub fn propose(&mut self, caller: Address, new_key: Address, now: u64) -> Result<(), VaultError> {
        self.require_guardian(&caller)?;
        if self.pending.is_some() {
            return Err(VaultError::RecoveryPending);
        }
        if new_key.is_zero() || new_key == self.owner {
            return Err(VaultError::InvalidParty("replacement key must be a new address"));
        }
        if self.guardians.contains(&new_key) {
            return Err(VaultError::InvalidParty("replacement key belongs to a guardian"));
        }

        let mut request = RecoveryRequest {
            new_key,
            proposed_by: caller,
            proposed_at: now,
            approvals: AttestationQuorum::new(ATTESTATION_THRESHOLD, ATTESTATION_COOLDOWN),
            executable_at: None,
        };
        Self::approve_request(&mut request, caller, now, self.delay)?;
        log::info!("Recovery to {} proposed by {}", new_key, caller);
        self.pending = Some(request);
        Ok(())
    }

    /// A guardian approves the pending request. Returns the approval count.
    pub fn approve(&mut self, caller: Address, now: u64) -> Result<u32, VaultError> {
        self.require_guardian(&caller)?;
        let delay = self.delay;
        let request = self.pending.as_mut().ok_or(VaultError::NoRecoveryPending)?;
        let mut updated = request.clone();
        let count = Self::approve_request(&mut updated, caller, now, delay)?;
        *request = updated;
        Ok(count)
    }

    fn approve_request(
        request: &mut RecoveryRequest,
        caller: Address,
        now: u64,
        delay: u64,
    ) -> Result<u32, VaultError> {
        let count = request.approvals.attest(GuardianId::Address(caller), now)?;
        if request.approvals.reached() && request.executable_at.is_none() {
            let at = now.saturating_add(delay);
            request.executable_at = Some(at);
            log::info!("Recovery to {} approved; executable at {}", request.new_key, at);
        }
        Ok(count)
    }

    /// Swap the owner key once the quorum is in and the delay has passed.
    /// Returns the new owner.
    pub fn execute(&mut self, now: u64) -> Result<Address, VaultError> {
        let request = self.pending.as_ref().ok_or(VaultError::NoRecoveryPending)?;
        match request.executable_at {
            None => Err(VaultError::RecoveryNotApproved),
            Some(ready_at) if now < ready_at => Err(VaultError::TimelockPending { ready_at }),
            Some(_) => {
                let new_key = request.new_key;
                log::info!("Recovery executed: owner {} -> {}", self.owner, new_key);
                self.owner = new_key;
                self.pending = None;
                Ok(new_key)
            }
        }
    }

    /// Owner cancels the pending request.
    pub fn cancel(&mut self, caller: Address) -> Result<(), VaultError> {
        if caller != self.owner {
            return Err(VaultError::Unauthorized("not the owner"));
        }
        let request = self.pending.take().ok_or(VaultError::NoRecoveryPending)?;
        log::info!("Recovery to {} cancelled by owner", request.new_key);
        Ok(())
    }
}
