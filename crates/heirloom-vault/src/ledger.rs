//! The vault ledger
//!
//! Owns every vault, the owner index, the death oracle and the admin
//! settings. All entry points take the authenticated `caller` and the
//! current time explicitly.
//!
//! # Atomicity
//!
//! Each mutating call works on a scratch copy of the vault: it recomputes
//! the status, then acts, and commits the copy (with its events) only if
//! every check passed. A failed call leaves the ledger exactly as it was,
//! including the lazily computed status.
//!
//! # Staleness
//!
//! Stored status only moves on mutating calls. Read views evaluate at the
//! supplied `now` without persisting; [`VaultLedger::update_all`] is the
//! keeper's sweep that persists every pending transition.

use crate::attestation::{AttestationQuorum, AttestationRecord};
use crate::error::VaultError;
use crate::events::{StatusChange, VaultEvent};
use crate::guardian::{GuardianId, GuardianRegistry};
use crate::lifecycle::{self, Deadlines, Vault};
use crate::oracle::{DeathOracle, OracleVote, TrustedOracle};
use crate::types::{
    DeathVerification, VaultId, VaultStatus, VaultTerms, MAX_BENEFICIARIES,
    MAX_DEATH_VERIFICATION_DELAY, REVOKE_WINDOW,
};
use heirloom_core::{recover_binding_signer, Address, BindingSignature, EmailHash, MetadataHash};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Result of an oracle's `verify_death` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeathOutcome {
    /// Recorded, but the oracle set needs more confirmations
    Pending { have: usize, need: usize },
    /// These vaults are now verified
    Verified(Vec<VaultId>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultLedger<O = TrustedOracle> {
    admin: Address,
    oracle: O,
    /// Seconds between oracle verification and ReadyForClaim
    death_verification_delay: u64,
    next_id: u64,
    vaults: BTreeMap<VaultId, Vault>,
    owner_index: BTreeMap<Address, BTreeSet<VaultId>>,
    #[serde(skip)]
    events: Vec<VaultEvent>,
}

impl VaultLedger<TrustedOracle> {
    /// Ledger with a single trusted oracle address.
    pub fn with_trusted_oracle(
        admin: Address,
        oracle: Address,
        death_verification_delay: u64,
    ) -> Result<Self, VaultError> {
        Self::new(admin, TrustedOracle::new(oracle)?, death_verification_delay)
    }

    /// Admin-only: replace the trusted oracle address.
    pub fn set_oracle(&mut self, caller: Address, oracle: Address) -> Result<(), VaultError> {
        self.replace_oracle(caller, TrustedOracle::new(oracle)?)
    }
}

fn push_change(events: &mut Vec<VaultEvent>, vault_id: VaultId, from: VaultStatus, to: VaultStatus, at: u64) {
    if from != to {
        events.push(VaultEvent::StatusChanged(StatusChange {
            vault_id,
            from,
            to,
            at,
        }));
    }
}

fn refresh_into(vault: &mut Vault, now: u64, delay: u64, events: &mut Vec<VaultEvent>) {
    if let Some(previous) = vault.refresh(now, delay) {
        log::debug!("Vault {} recomputed: {} -> {}", vault.id, previous, vault.status);
        push_change(events, vault.id, previous, vault.status, now);
    }
}

fn require_owner(vault: &Vault, caller: &Address) -> Result<(), VaultError> {
    if vault.owner != *caller {
        return Err(VaultError::Unauthorized("not the vault owner"));
    }
    Ok(())
}

fn require_live(vault: &Vault, operation: &'static str) -> Result<(), VaultError> {
    if !vault.status.is_live() {
        return Err(VaultError::InvalidState {
            operation,
            status: vault.status,
        });
    }
    Ok(())
}

fn require_active(vault: &Vault, operation: &'static str) -> Result<(), VaultError> {
    if vault.status != VaultStatus::Active {
        return Err(VaultError::InvalidState {
            operation,
            status: vault.status,
        });
    }
    Ok(())
}

/// Count one attestation; trigger the vault if it completes the quorum.
fn record_attestation(
    vault: &mut Vault,
    guardian: GuardianId,
    now: u64,
    events: &mut Vec<VaultEvent>,
) -> Result<u32, VaultError> {
    let count = vault.attestations.attest(guardian, now)?;
    events.push(VaultEvent::DeathAttested {
        vault_id: vault.id,
        guardian,
        count,
    });
    log::info!(
        "Vault {}: {} attested death ({}/{})",
        vault.id,
        guardian,
        count,
        vault.attestations.threshold()
    );

    if vault.attestations.reached() && vault.status.is_live() {
        let from = vault.status;
        vault.status = VaultStatus::Triggered;
        vault.triggered_at = Some(now);
        push_change(events, vault.id, from, VaultStatus::Triggered, now);
        log::info!("Vault {} triggered by guardian quorum", vault.id);
    }
    Ok(count)
}

fn link_guardian(
    vault: &mut Vault,
    email_hash: EmailHash,
    address: Address,
    events: &mut Vec<VaultEvent>,
) -> Result<(), VaultError> {
    vault
        .guardians
        .link(&email_hash, address, vault.owner, &vault.beneficiaries)?;
    events.push(VaultEvent::EmailLinked {
        vault_id: vault.id,
        email_hash,
        address,
    });
    log::info!("Vault {}: email guardian linked to {}", vault.id, address);
    Ok(())
}

impl<O: DeathOracle + Clone> VaultLedger<O> {
    pub fn new(admin: Address, oracle: O, death_verification_delay: u64) -> Result<Self, VaultError> {
        if admin.is_zero() {
            return Err(VaultError::InvalidParty("admin is the zero address"));
        }
        if death_verification_delay > MAX_DEATH_VERIFICATION_DELAY {
            return Err(VaultError::DelayTooLong(death_verification_delay));
        }
        Ok(Self {
            admin,
            oracle,
            death_verification_delay,
            next_id: 1,
            vaults: BTreeMap::new(),
            owner_index: BTreeMap::new(),
            events: Vec::new(),
        })
    }

    /// Run `op` against a refreshed scratch copy of one vault and commit
    /// it only on success.
    fn transact<T>(
        &mut self,
        vault_id: VaultId,
        now: u64,
        op: impl FnOnce(&mut Vault, &mut Vec<VaultEvent>) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let mut scratch = self
            .vaults
            .get(&vault_id)
            .cloned()
            .ok_or(VaultError::VaultNotFound(vault_id))?;
        let mut events = Vec::new();
        refresh_into(&mut scratch, now, self.death_verification_delay, &mut events);

        let out = op(&mut scratch, &mut events)?;

        self.vaults.insert(vault_id, scratch);
        self.events.append(&mut events);
        Ok(out)
    }

    // ========================================================================
    // Owner operations
    // ========================================================================

    pub fn create_vault(
        &mut self,
        owner: Address,
        terms: VaultTerms,
        beneficiaries: Vec<Address>,
        guardians: &[Address],
        metadata: MetadataHash,
        now: u64,
    ) -> Result<VaultId, VaultError> {
        if owner.is_zero() {
            return Err(VaultError::InvalidParty("owner is the zero address"));
        }
        terms.validate()?;
        if beneficiaries.is_empty() || beneficiaries.len() > MAX_BENEFICIARIES {
            return Err(VaultError::InvalidBeneficiaryCount(beneficiaries.len()));
        }
        let mut seen = HashSet::new();
        for b in &beneficiaries {
            if b.is_zero() {
                return Err(VaultError::InvalidParty("beneficiary is the zero address"));
            }
            if *b == owner {
                return Err(VaultError::InvalidParty("owner cannot be a beneficiary"));
            }
            if !seen.insert(*b) {
                return Err(VaultError::DuplicateBeneficiary(*b));
            }
        }
        let registry = GuardianRegistry::new(guardians, owner, &beneficiaries)?;

        let id = VaultId(self.next_id);
        let vault = Vault {
            id,
            owner,
            terms,
            created_at: now,
            last_check_in: now,
            beneficiaries,
            guardians: registry,
            attestations: AttestationQuorum::default(),
            metadata,
            status: VaultStatus::Active,
            triggered_at: None,
            death: None,
            claims: BTreeSet::new(),
        };

        self.next_id += 1;
        self.vaults.insert(id, vault);
        self.owner_index.entry(owner).or_default().insert(id);
        self.events.push(VaultEvent::VaultCreated { vault_id: id, owner });
        log::info!("Created vault {} for {}", id, owner);
        Ok(id)
    }

    /// Owner proves liveness: resets the deadline and the attestation round.
    pub fn check_in(&mut self, caller: Address, vault_id: VaultId, now: u64) -> Result<(), VaultError> {
        self.transact(vault_id, now, |vault, events| {
            require_owner(vault, &caller)?;
            require_live(vault, "check in")?;
            let from = vault.status;
            vault.reset(now);
            events.push(VaultEvent::CheckedIn { vault_id, at: now });
            push_change(events, vault_id, from, VaultStatus::Active, now);
            log::info!("Vault {}: owner checked in", vault_id);
            Ok(())
        })
    }

    /// Owner cancels a trigger within the revoke window.
    pub fn emergency_revoke(
        &mut self,
        caller: Address,
        vault_id: VaultId,
        now: u64,
    ) -> Result<(), VaultError> {
        self.transact(vault_id, now, |vault, events| {
            require_owner(vault, &caller)?;
            let closed_at = match (vault.status, vault.revoke_deadline()) {
                (VaultStatus::Triggered, Some(closed_at)) => closed_at,
                (status, _) => {
                    return Err(VaultError::InvalidState {
                        operation: "revoke",
                        status,
                    })
                }
            };
            if now > closed_at {
                return Err(VaultError::RevokeWindowExpired { closed_at });
            }
            vault.reset(now);
            events.push(VaultEvent::EmergencyRevoked { vault_id, at: now });
            push_change(events, vault_id, VaultStatus::Triggered, VaultStatus::Active, now);
            log::info!("Vault {}: owner revoked trigger", vault_id);
            Ok(())
        })
    }

    pub fn update_metadata(
        &mut self,
        caller: Address,
        vault_id: VaultId,
        metadata: MetadataHash,
        now: u64,
    ) -> Result<(), VaultError> {
        self.transact(vault_id, now, |vault, events| {
            require_owner(vault, &caller)?;
            require_active(vault, "update metadata")?;
            vault.metadata = metadata;
            events.push(VaultEvent::MetadataUpdated { vault_id, metadata });
            Ok(())
        })
    }

    /// Owner adds an email guardian (up to five guardians in total).
    pub fn add_guardian_by_email_hash(
        &mut self,
        caller: Address,
        vault_id: VaultId,
        email_hash: EmailHash,
        now: u64,
    ) -> Result<(), VaultError> {
        self.transact(vault_id, now, |vault, events| {
            require_owner(vault, &caller)?;
            require_active(vault, "add a guardian")?;
            vault.guardians.add_email(email_hash)?;
            events.push(VaultEvent::GuardianAdded {
                vault_id,
                guardian: GuardianId::Email(email_hash),
            });
            log::info!(
                "Vault {}: email guardian added ({} guardians)",
                vault_id,
                vault.guardians.len()
            );
            Ok(())
        })
    }

    // ========================================================================
    // Guardian operations
    // ========================================================================

    /// Address guardian attests the owner's death. Returns the new count.
    pub fn attest_death(&mut self, caller: Address, vault_id: VaultId, now: u64) -> Result<u32, VaultError> {
        self.transact(vault_id, now, |vault, events| {
            if !vault.guardians.is_address_guardian(&caller) {
                return Err(VaultError::Unauthorized("not an address guardian"));
            }
            require_live(vault, "attest")?;
            record_attestation(vault, GuardianId::Address(caller), now, events)
        })
    }

    /// Email guardian attests with a binding signature.
    ///
    /// The first valid signature links the recovered address to the email
    /// hash for good; later attestations must recover to that same address.
    pub fn attest_death_by_email_hash(
        &mut self,
        vault_id: VaultId,
        email_hash: EmailHash,
        signature: &BindingSignature,
        now: u64,
    ) -> Result<u32, VaultError> {
        self.transact(vault_id, now, |vault, events| {
            let linked = vault
                .guardians
                .linked_address(&email_hash)
                .map_err(|_| VaultError::Unauthorized("email hash is not a guardian"))?;
            let signer = recover_binding_signer(vault_id.0, &email_hash, signature).map_err(|e| {
                log::warn!("Vault {}: bad attestation signature: {}", vault_id, e);
                e
            })?;
            require_live(vault, "attest")?;

            match linked {
                Some(address) if address != signer => {
                    log::warn!(
                        "Vault {}: attestation for linked email signed by {} (linked {})",
                        vault_id,
                        signer,
                        address
                    );
                    return Err(VaultError::Unauthorized(
                        "signer is not the linked guardian address",
                    ));
                }
                Some(_) => {}
                None => link_guardian(vault, email_hash, signer, events)?,
            }
            record_attestation(vault, GuardianId::Email(email_hash), now, events)
        })
    }

    /// Link an email guardian to the address that signed the binding
    /// message, without attesting. Returns the linked address.
    pub fn link_email_hash_to_address(
        &mut self,
        vault_id: VaultId,
        email_hash: EmailHash,
        signature: &BindingSignature,
        now: u64,
    ) -> Result<Address, VaultError> {
        self.transact(vault_id, now, |vault, events| {
            if vault.status.is_terminal() {
                return Err(VaultError::InvalidState {
                    operation: "link an email guardian",
                    status: vault.status,
                });
            }
            let signer = recover_binding_signer(vault_id.0, &email_hash, signature)?;
            link_guardian(vault, email_hash, signer, events)?;
            Ok(signer)
        })
    }

    // ========================================================================
    // Oracle and admin operations
    // ========================================================================

    /// Oracle confirms `owner`'s death.
    ///
    /// Verifies every unclaimed vault of the owner that is not yet
    /// verified. Vaults still Active/Warning move to DeathVerified (or
    /// straight to ReadyForClaim with a zero delay); Triggered and
    /// ReadyForClaim vaults only record the verification.
    pub fn verify_death(&mut self, caller: Address, owner: Address, now: u64) -> Result<DeathOutcome, VaultError> {
        if !self.oracle.is_member(&caller) {
            log::warn!("verify_death from non-oracle {}", caller);
            return Err(VaultError::Unauthorized("not an oracle"));
        }
        let ids: Vec<VaultId> = self
            .owner_index
            .get(&owner)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        if ids.is_empty() {
            return Err(VaultError::OwnerNotFound(owner));
        }

        let delay = self.death_verification_delay;
        let mut events = Vec::new();
        let mut scratch = Vec::with_capacity(ids.len());
        for id in &ids {
            let mut vault = self
                .vaults
                .get(id)
                .cloned()
                .ok_or(VaultError::VaultNotFound(*id))?;
            refresh_into(&mut vault, now, delay, &mut events);
            scratch.push(vault);
        }
        if !scratch
            .iter()
            .any(|v| v.death.is_none() && !v.status.is_terminal())
        {
            return Err(VaultError::DeathAlreadyVerified);
        }

        let mut oracle = self.oracle.clone();
        let outcome = match oracle.confirm(caller, owner)? {
            OracleVote::Pending { have, need } => {
                events.push(VaultEvent::DeathConfirmationPending {
                    owner,
                    oracle: caller,
                    have,
                    need,
                });
                log::info!("Death of {} confirmed by {} ({}/{})", owner, caller, have, need);
                DeathOutcome::Pending { have, need }
            }
            OracleVote::Confirmed => {
                let mut verified = Vec::new();
                for vault in scratch
                    .iter_mut()
                    .filter(|v| v.death.is_none() && !v.status.is_terminal())
                {
                    vault.death = Some(DeathVerification {
                        verified_at: now,
                        verified_by: caller,
                    });
                    events.push(VaultEvent::DeathVerified {
                        vault_id: vault.id,
                        oracle: caller,
                        at: now,
                    });
                    if vault.status.is_live() {
                        let from = vault.status;
                        vault.status = VaultStatus::DeathVerified;
                        push_change(&mut events, vault.id, from, VaultStatus::DeathVerified, now);
                        refresh_into(vault, now, delay, &mut events);
                    }
                    log::info!("Vault {}: death verified ({})", vault.id, vault.status);
                    verified.push(vault.id);
                }
                DeathOutcome::Verified(verified)
            }
        };

        self.oracle = oracle;
        for vault in scratch {
            self.vaults.insert(vault.id, vault);
        }
        self.events.append(&mut events);
        Ok(outcome)
    }

    /// Admin-only: install a different oracle.
    pub fn replace_oracle(&mut self, caller: Address, oracle: O) -> Result<(), VaultError> {
        self.require_admin(&caller)?;
        let members = oracle.members();
        self.oracle = oracle;
        log::info!("Oracle set changed ({} members)", members.len());
        self.events.push(VaultEvent::OracleChanged { oracles: members });
        Ok(())
    }

    /// Admin-only: set the delay between verification and ReadyForClaim.
    pub fn set_death_verification_delay(&mut self, caller: Address, delay_secs: u64) -> Result<(), VaultError> {
        self.require_admin(&caller)?;
        if delay_secs > MAX_DEATH_VERIFICATION_DELAY {
            return Err(VaultError::DelayTooLong(delay_secs));
        }
        self.death_verification_delay = delay_secs;
        self.events.push(VaultEvent::DelayChanged { delay_secs });
        log::info!("Death verification delay set to {}s", delay_secs);
        Ok(())
    }

    fn require_admin(&self, caller: &Address) -> Result<(), VaultError> {
        if *caller != self.admin {
            return Err(VaultError::Unauthorized("not the admin"));
        }
        Ok(())
    }

    // ========================================================================
    // Beneficiary operations
    // ========================================================================

    /// Beneficiary claims. Returns the vault status afterwards.
    pub fn claim(&mut self, caller: Address, vault_id: VaultId, now: u64) -> Result<VaultStatus, VaultError> {
        let delay = self.death_verification_delay;
        self.transact(vault_id, now, |vault, events| {
            if !vault.is_beneficiary(&caller) {
                return Err(VaultError::Unauthorized("not a beneficiary"));
            }
            if vault.claims.contains(&caller) {
                return Err(VaultError::AlreadyClaimed);
            }
            match vault.status {
                VaultStatus::Triggered | VaultStatus::ReadyForClaim => {}
                VaultStatus::DeathVerified => {
                    return Err(VaultError::VerificationDelayPending {
                        ready_at: vault.verification_ready_at(delay).unwrap_or(now),
                    })
                }
                status => {
                    return Err(VaultError::InvalidState {
                        operation: "claim",
                        status,
                    })
                }
            }

            vault.claims.insert(caller);
            events.push(VaultEvent::Claimed {
                vault_id,
                beneficiary: caller,
            });
            log::info!(
                "Vault {}: {} claimed ({}/{})",
                vault_id,
                caller,
                vault.claims.len(),
                vault.beneficiaries.len()
            );
            if vault.all_claimed() {
                let from = vault.status;
                vault.status = VaultStatus::Claimed;
                push_change(events, vault_id, from, VaultStatus::Claimed, now);
            }
            Ok(vault.status)
        })
    }

    // ========================================================================
    // Explicit updates
    // ========================================================================

    /// Recompute and persist one vault's status.
    pub fn update_status(&mut self, vault_id: VaultId, now: u64) -> Result<VaultStatus, VaultError> {
        self.transact(vault_id, now, |vault, _| Ok(vault.status))
    }

    /// Recompute and persist every vault; returns the transitions.
    pub fn update_all(&mut self, now: u64) -> Vec<StatusChange> {
        let delay = self.death_verification_delay;
        let mut changes = Vec::new();
        for vault in self.vaults.values_mut() {
            if let Some(from) = vault.refresh(now, delay) {
                changes.push(StatusChange {
                    vault_id: vault.id,
                    from,
                    to: vault.status,
                    at: now,
                });
            }
        }
        self.events
            .extend(changes.iter().copied().map(VaultEvent::StatusChanged));
        changes
    }

    /// Drain events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // Read views
    // ========================================================================

    pub fn vault(&self, vault_id: VaultId) -> Result<&Vault, VaultError> {
        self.vaults
            .get(&vault_id)
            .ok_or(VaultError::VaultNotFound(vault_id))
    }

    pub fn vaults(&self) -> impl Iterator<Item = &Vault> {
        self.vaults.values()
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    /// Vaults created by `owner`, in creation order.
    pub fn vaults_of(&self, owner: &Address) -> Vec<VaultId> {
        self.owner_index
            .get(owner)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Status at `now`, evaluated without persisting.
    pub fn status(&self, vault_id: VaultId, now: u64) -> Result<VaultStatus, VaultError> {
        let vault = self.vault(vault_id)?;
        Ok(lifecycle::evaluate(vault, now, self.death_verification_delay).status)
    }

    pub fn deadlines(&self, vault_id: VaultId, now: u64) -> Result<Deadlines, VaultError> {
        Ok(self.vault(vault_id)?.deadlines(now))
    }

    pub fn attestation_count(&self, vault_id: VaultId) -> Result<u32, VaultError> {
        Ok(self.vault(vault_id)?.attestations.count())
    }

    pub fn attestation_of(
        &self,
        vault_id: VaultId,
        guardian: &GuardianId,
    ) -> Result<AttestationRecord, VaultError> {
        Ok(self.vault(vault_id)?.attestations.record(guardian))
    }

    pub fn death_verification(&self, vault_id: VaultId) -> Result<Option<DeathVerification>, VaultError> {
        Ok(self.vault(vault_id)?.death)
    }

    pub fn claimable_at(&self, vault_id: VaultId, now: u64) -> Result<Option<u64>, VaultError> {
        let vault = self.vault(vault_id)?;
        Ok(lifecycle::claimable_at(
            vault,
            now,
            self.death_verification_delay,
        ))
    }

    /// Seconds left to revoke, or `None` if the vault is not Triggered at `now`.
    pub fn revoke_window_remaining(&self, vault_id: VaultId, now: u64) -> Result<Option<u64>, VaultError> {
        let vault = self.vault(vault_id)?;
        let eval = lifecycle::evaluate(vault, now, self.death_verification_delay);
        if eval.status != VaultStatus::Triggered {
            return Ok(None);
        }
        Ok(eval
            .triggered_at
            .map(|t| t.saturating_add(REVOKE_WINDOW).saturating_sub(now)))
    }

    pub fn claimed_by(&self, vault_id: VaultId) -> Result<Vec<Address>, VaultError> {
        Ok(self.vault(vault_id)?.claims.iter().copied().collect())
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn death_verification_delay(&self) -> u64 {
        self.death_verification_delay
    }

    /// Consistency checks for state loaded from disk.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.admin.is_zero() {
            return Err(VaultError::CorruptState("zero admin".into()));
        }
        if self.death_verification_delay > MAX_DEATH_VERIFICATION_DELAY {
            return Err(VaultError::DelayTooLong(self.death_verification_delay));
        }
        let mut indexed = 0usize;
        for (owner, ids) in &self.owner_index {
            for id in ids {
                match self.vaults.get(id) {
                    Some(v) if v.owner == *owner => indexed += 1,
                    _ => {
                        return Err(VaultError::CorruptState(format!(
                            "owner index entry {} -> {} does not match a vault",
                            owner, id
                        )))
                    }
                }
            }
        }
        if indexed != self.vaults.len() {
            return Err(VaultError::CorruptState(format!(
                "{} vaults but {} indexed",
                self.vaults.len(),
                indexed
            )));
        }
        for (id, vault) in &self.vaults {
            if vault.id != *id || id.0 >= self.next_id {
                return Err(VaultError::CorruptState(format!("vault key {} mismatch", id)));
            }
            vault.terms.validate()?;
        }
        Ok(())
    }
}
