//! Death oracle bridge
//!
//! The ledger asks a [`DeathOracle`] whether a confirmation from some
//! caller completes a death verification. [`TrustedOracle`] is a single
//! trusted address. [`OracleQuorum`] needs k of n oracle addresses to
//! confirm the same owner.

use crate::error::VaultError;
use heirloom_core::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Result of a single oracle confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleVote {
    /// More confirmations needed
    Pending { have: usize, need: usize },
    Confirmed,
}

pub trait DeathOracle {
    /// Whether `who` may confirm deaths.
    fn is_member(&self, who: &Address) -> bool;

    /// Every address that may confirm.
    fn members(&self) -> Vec<Address>;

    /// Record a confirmation of `owner`'s death from `oracle`.
    fn confirm(&mut self, oracle: Address, owner: Address) -> Result<OracleVote, VaultError>;
}

/// A single trusted oracle address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedOracle {
    address: Address,
}

impl TrustedOracle {
    pub fn new(address: Address) -> Result<Self, VaultError> {
        if address.is_zero() {
            return Err(VaultError::InvalidOracleSet("oracle is the zero address".into()));
        }
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

impl DeathOracle for TrustedOracle {
    fn is_member(&self, who: &Address) -> bool {
        *who == self.address
    }

    fn members(&self) -> Vec<Address> {
        vec![self.address]
    }

    fn confirm(&mut self, oracle: Address, _owner: Address) -> Result<OracleVote, VaultError> {
        if oracle != self.address {
            return Err(VaultError::Unauthorized("not the oracle"));
        }
        Ok(OracleVote::Confirmed)
    }
}

/// k-of-n oracle addresses. Each oracle's confirmation is recorded once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleQuorum {
    members: BTreeSet<Address>,
    threshold: usize,
    /// Confirmations collected so far, by owner
    pending: BTreeMap<Address, BTreeSet<Address>>,
}

impl OracleQuorum {
    pub fn new(members: impl IntoIterator<Item = Address>, threshold: usize) -> Result<Self, VaultError> {
        let mut set = BTreeSet::new();
        for m in members {
            if m.is_zero() {
                return Err(VaultError::InvalidOracleSet("oracle is the zero address".into()));
            }
            if !set.insert(m) {
                return Err(VaultError::InvalidOracleSet(format!("duplicate oracle {}", m)));
            }
        }
        if threshold == 0 || threshold > set.len() {
            return Err(VaultError::InvalidOracleSet(format!(
                "threshold {} outside 1..={}",
                threshold,
                set.len()
            )));
        }
        Ok(Self {
            members: set,
            threshold,
            pending: BTreeMap::new(),
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Confirmations collected for `owner` that have not yet completed.
    pub fn confirmations(&self, owner: &Address) -> usize {
        self.pending.get(owner).map(BTreeSet::len).unwrap_or(0)
    }
}

impl DeathOracle for OracleQuorum {
    fn is_member(&self, who: &Address) -> bool {
        self.members.contains(who)
    }

    fn members(&self) -> Vec<Address> {
        self.members.iter().copied().collect()
    }

    fn confirm(&mut self, oracle: Address, owner: Address) -> Result<OracleVote, VaultError> {
        if !self.members.contains(&oracle) {
            return Err(VaultError::Unauthorized("not an oracle"));
        }
        let votes = self.pending.entry(owner).or_default();
        if !votes.insert(oracle) {
            return Err(VaultError::DuplicateConfirmation(oracle));
        }
        let have = votes.len();
        if have >= self.threshold {
            self.pending.remove(&owner);
            return Ok(OracleVote::Confirmed);
        }
        Ok(OracleVote::Pending {
            have,
            need: self.threshold,
        })
    }
}
