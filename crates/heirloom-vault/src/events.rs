//! Ledger events emitted by successful mutations

use crate::guardian::GuardianId;
use crate::types::{VaultId, VaultStatus};
use heirloom_core::{Address, EmailHash, MetadataHash};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Events appended by the ledger; drained with `VaultLedger::take_events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    VaultCreated {
        vault_id: VaultId,
        owner: Address,
    },
    CheckedIn {
        vault_id: VaultId,
        at: u64,
    },
    StatusChanged(StatusChange),
    GuardianAdded {
        vault_id: VaultId,
        guardian: GuardianId,
    },
    EmailLinked {
        vault_id: VaultId,
        email_hash: EmailHash,
        address: Address,
    },
    DeathAttested {
        vault_id: VaultId,
        guardian: GuardianId,
        /// Attestation count after this one
        count: u32,
    },
    EmergencyRevoked {
        vault_id: VaultId,
        at: u64,
    },
    /// An oracle confirmed but more confirmations are required
    DeathConfirmationPending {
        owner: Address,
        oracle: Address,
        have: usize,
        need: usize,
    },
    DeathVerified {
        vault_id: VaultId,
        oracle: Address,
        at: u64,
    },
    Claimed {
        vault_id: VaultId,
        beneficiary: Address,
    },
    MetadataUpdated {
        vault_id: VaultId,
        metadata: MetadataHash,
    },
    OracleChanged {
        oracles: Vec<Address>,
    },
    DelayChanged {
        delay_secs: u64,
    },
}

/// A persisted status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub vault_id: VaultId,
    pub from: VaultStatus,
    pub to: VaultStatus,
    pub at: u64,
}

impl fmt::Display for StatusChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vault {}: {} -> {}", self.vault_id, self.from, self.to)
    }
}

impl VaultEvent {
    /// The vault this event concerns, if it concerns exactly one.
    pub fn vault_id(&self) -> Option<VaultId> {
        match self {
            VaultEvent::VaultCreated { vault_id, .. }
            | VaultEvent::CheckedIn { vault_id, .. }
            | VaultEvent::GuardianAdded { vault_id, .. }
            | VaultEvent::EmailLinked { vault_id, .. }
            | VaultEvent::DeathAttested { vault_id, .. }
            | VaultEvent::EmergencyRevoked { vault_id, .. }
            | VaultEvent::DeathVerified { vault_id, .. }
            | VaultEvent::Claimed { vault_id, .. }
            | VaultEvent::MetadataUpdated { vault_id, .. } => Some(*vault_id),
            VaultEvent::StatusChanged(change) => Some(change.vault_id),
            VaultEvent::DeathConfirmationPending { .. }
            | VaultEvent::OracleChanged { .. }
            | VaultEvent::DelayChanged { .. } => None,
        }
    }

    pub fn as_status_change(&self) -> Option<&StatusChange> {
        match self {
            VaultEvent::StatusChanged(change) => Some(change),
            _ => None,
        }
    }
}
