//! Shared test utilities for heirloom-vault tests.
//!
//! Deterministic keys and a standard cast of parties, used by unit tests,
//! the crate's integration tests and the e2e package.

use crate::ledger::VaultLedger;
use crate::types::{VaultId, VaultTerms, DAY};
use heirloom_core::{sign_binding, Address, BindingSignature, EmailHash, MetadataHash};
use secp256k1::SecretKey;

/// A fixed, realistic starting timestamp (2023-11-14).
pub const T0: u64 = 1_700_000_000;

/// Generate a deterministic key from a seed byte.
///
/// The secret key is `[0x01, 0x00, ..., 0x00, seed]` (32 bytes).
/// Different seed bytes produce different keys.
pub fn test_keypair(seed_byte: u8) -> (SecretKey, Address) {
    let mut secret_bytes = [0u8; 32];
    secret_bytes[31] = seed_byte;
    secret_bytes[0] = 0x01;
    let sk = SecretKey::from_slice(&secret_bytes).unwrap();
    let addr = Address::from_secret_key(&sk);
    (sk, addr)
}

pub fn test_address(seed_byte: u8) -> Address {
    test_keypair(seed_byte).1
}

/// Timestamp `days` after [`T0`].
pub fn day(days: u64) -> u64 {
    T0 + days * DAY
}

/// The standard cast: one owner, three address guardians, two
/// beneficiaries, an admin, an oracle and two would-be email guardians.
pub struct Parties {
    pub owner: Address,
    pub guardians: [Address; 3],
    pub beneficiaries: Vec<Address>,
    pub admin: Address,
    pub oracle: Address,
    pub email_guardian_keys: [SecretKey; 2],
    pub emails: [&'static str; 2],
}

impl Parties {
    pub fn new() -> Self {
        Self {
            owner: test_address(1),
            guardians: [test_address(2), test_address(3), test_address(4)],
            beneficiaries: vec![test_address(5), test_address(6)],
            admin: test_address(7),
            oracle: test_address(8),
            email_guardian_keys: [test_keypair(20).0, test_keypair(21).0],
            emails: ["alice@example.com", "bob@example.com"],
        }
    }

    pub fn email_hash(&self, i: usize) -> EmailHash {
        EmailHash::from_email(self.emails[i])
    }

    pub fn email_guardian_address(&self, i: usize) -> Address {
        Address::from_secret_key(&self.email_guardian_keys[i])
    }

    /// Binding signature from email guardian `i` for `vault_id`.
    pub fn email_signature(&self, i: usize, vault_id: VaultId) -> BindingSignature {
        sign_binding(&self.email_guardian_keys[i], vault_id.0, &self.email_hash(i))
    }
}

impl Default for Parties {
    fn default() -> Self {
        Self::new()
    }
}

/// Ledger with the standard admin and oracle.
pub fn test_ledger(parties: &Parties, delay_days: u64) -> VaultLedger {
    VaultLedger::with_trusted_oracle(parties.admin, parties.oracle, delay_days * DAY).unwrap()
}

/// Create the standard vault at `now`.
pub fn create_test_vault(
    ledger: &mut VaultLedger,
    parties: &Parties,
    interval_days: u64,
    grace_days: u64,
    now: u64,
) -> VaultId {
    ledger
        .create_vault(
            parties.owner,
            VaultTerms::from_days(interval_days, grace_days).unwrap(),
            parties.beneficiaries.clone(),
            &parties.guardians,
            MetadataHash::digest(b"vault metadata"),
            now,
        )
        .unwrap()
}
