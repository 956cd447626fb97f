//! Fragment distribution service
//!
//! Wraps split + derive + encrypt + store behind one entry point per
//! operation. Vaults are independent and can be processed in parallel;
//! within one vault, distribution is serialized by a per-vault lock so two
//! concurrent splits cannot both write a guardian set.

use crate::fragment::{open_fragment, seal_fragments, Fragment, GuardianContact};
use crate::shamir::{combine_shares, Share};
use crate::store::FragmentStore;
use crate::FragmentError;
use heirloom_core::KdfParams;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use zeroize::Zeroizing;

pub struct SecretSplitter<S: FragmentStore> {
    store: Mutex<S>,
    vault_locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
    kdf: KdfParams,
}

impl<S: FragmentStore> SecretSplitter<S> {
    pub fn new(store: S) -> Self {
        Self::with_kdf(store, KdfParams::default())
    }

    pub fn with_kdf(store: S, kdf: KdfParams) -> Self {
        Self {
            store: Mutex::new(store),
            vault_locks: Mutex::new(HashMap::new()),
            kdf,
        }
    }

    fn vault_lock(&self, vault_id: u64) -> Result<Arc<Mutex<()>>, FragmentError> {
        let mut locks = self
            .vault_locks
            .lock()
            .map_err(|_| FragmentError::LockPoisoned)?;
        Ok(locks.entry(vault_id).or_default().clone())
    }

    /// Drop the vault's lock entry unless another caller still holds it.
    /// Clones are only handed out under the map lock, so a count of one
    /// means nobody is waiting on it.
    fn release_vault_lock(&self, vault_id: u64) -> Result<(), FragmentError> {
        let mut locks = self
            .vault_locks
            .lock()
            .map_err(|_| FragmentError::LockPoisoned)?;
        if locks
            .get(&vault_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&vault_id);
        }
        Ok(())
    }

    fn store(&self) -> Result<MutexGuard<'_, S>, FragmentError> {
        self.store.lock().map_err(|_| FragmentError::LockPoisoned)
    }

    /// Split `master_secret` across `guardians` and persist every fragment.
    ///
    /// Fails with [`FragmentError::FragmentsExist`] if the vault already has
    /// a guardian set. Nothing is stored unless every fragment was built.
    pub fn distribute(
        &self,
        vault_id: u64,
        master_secret: &[u8],
        guardians: &[GuardianContact],
        now: u64,
    ) -> Result<Vec<Fragment>, FragmentError> {
        let lock = self.vault_lock(vault_id)?;
        let _guard = lock.lock().map_err(|_| FragmentError::LockPoisoned)?;

        if self.store()?.load(vault_id)?.is_some() {
            return Err(FragmentError::FragmentsExist(vault_id));
        }

        // Argon2 runs here, outside the store lock; other vaults proceed.
        let fragments = seal_fragments(vault_id, master_secret, guardians, self.kdf, now)?;
        self.store()?.store_all(vault_id, fragments.clone())?;

        log::info!(
            "Distributed {} fragments for vault {} (threshold {})",
            fragments.len(),
            vault_id,
            fragments.first().map(|f| f.threshold).unwrap_or_default()
        );
        Ok(fragments)
    }

    /// Every fragment of a vault.
    pub fn fragments(&self, vault_id: u64) -> Result<Vec<Fragment>, FragmentError> {
        self.store()?
            .load(vault_id)?
            .ok_or(FragmentError::NotFound(vault_id))
    }

    /// The fragment addressed to one guardian.
    pub fn fragment_for(&self, vault_id: u64, guardian_id: &str) -> Result<Fragment, FragmentError> {
        self.fragments(vault_id)?
            .into_iter()
            .find(|f| f.guardian_id == guardian_id)
            .ok_or_else(|| FragmentError::UnknownGuardian(guardian_id.to_string()))
    }

    /// Regenerate a guardian's passphrase (e.g. to re-send an invite).
    ///
    /// Needs the master secret; the passphrase itself is never stored.
    pub fn guardian_passphrase(
        &self,
        vault_id: u64,
        guardian_id: &str,
        master_secret: &[u8],
        email: &str,
    ) -> Result<Zeroizing<String>, FragmentError> {
        let fragment = self.fragment_for(vault_id, guardian_id)?;
        fragment.derivation.derive(master_secret, email)
    }

    /// Reconstruct the master secret from guardians' `(guardian_id, passphrase)`
    /// pairs. Needs at least the threshold number of distinct guardians.
    pub fn reconstruct(
        &self,
        vault_id: u64,
        unlocks: &[(&str, &str)],
    ) -> Result<Zeroizing<Vec<u8>>, FragmentError> {
        let fragments = self.fragments(vault_id)?;

        let mut seen = HashSet::new();
        let mut shares: Vec<Share> = Vec::with_capacity(unlocks.len());
        for &(guardian_id, passphrase) in unlocks {
            if !seen.insert(guardian_id) {
                return Err(FragmentError::DuplicateGuardian(guardian_id.to_string()));
            }
            let fragment = fragments
                .iter()
                .find(|f| f.guardian_id == guardian_id)
                .ok_or_else(|| FragmentError::UnknownGuardian(guardian_id.to_string()))?;
            shares.push(open_fragment(fragment, passphrase)?);
        }

        let secret = combine_shares(&shares)?;
        log::info!(
            "Reconstructed secret for vault {} from {} guardians",
            vault_id,
            shares.len()
        );
        Ok(secret)
    }

    /// Delete a vault's fragments. Returns whether any existed.
    pub fn purge(&self, vault_id: u64) -> Result<bool, FragmentError> {
        let lock = self.vault_lock(vault_id)?;
        let guard = lock.lock().map_err(|_| FragmentError::LockPoisoned)?;
        let removed = self.store()?.delete(vault_id)?;
        drop(guard);
        drop(lock);
        self.release_vault_lock(vault_id)?;
        if removed {
            log::info!("Purged fragments for vault {}", vault_id);
        }
        Ok(removed)
    }
}
