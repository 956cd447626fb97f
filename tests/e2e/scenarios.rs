//! End-to-end inheritance scenarios across heirloom-core, heirloom-shamir
//! and heirloom-vault.
//!
//! 1. Owner creates a vault and distributes the master secret to the
//!    guardians as encrypted fragments (file store)
//! 2. Owner goes silent; guardians attest; the vault triggers
//! 3. Beneficiaries claim; guardians hand over passphrases; the secret is
//!    reconstructed from any quorum of fragments
//!
//! Plus the oracle path, the revoke path, and a 24-byte secret over
//! a 2-of-3 split.

use heirloom_core::KdfParams;
use heirloom_shamir::{
    combine_shares, derive_guardian_passphrase, split_secret, FileFragmentStore, FragmentError,
    GuardianContact, SecretSplitter, ShamirError,
};
use heirloom_vault::test_utils::{create_test_vault, day, test_ledger, Parties, T0};
use heirloom_vault::{DeathOutcome, GuardianId, VaultError, VaultId, VaultStatus};
use tempfile::TempDir;

const MASTER: &[u8] = b"correct horse battery staple seed words";

fn guardian_contacts(p: &Parties) -> Vec<GuardianContact> {
    let emails = ["g1@example.com", "g2@example.com", "g3@example.com"];
    p.guardians
        .iter()
        .zip(emails)
        .map(|(g, email)| GuardianContact::new(GuardianId::Address(*g).to_string(), email))
        .collect()
}

fn splitter(dir: &TempDir) -> SecretSplitter<FileFragmentStore> {
    let store = FileFragmentStore::open(dir.path().join("fragments")).unwrap();
    SecretSplitter::with_kdf(store, KdfParams::insecure_fast())
}

#[test]
fn test_full_inheritance_via_guardian_quorum() {
    let p = Parties::new();
    let dir = TempDir::new().unwrap();
    let mut ledger = test_ledger(&p, 0);
    let splitter = splitter(&dir);

    // ── 1. Set up vault and fragments ──
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);
    let contacts = guardian_contacts(&p);
    let fragments = splitter.distribute(id.0, MASTER, &contacts, T0).unwrap();
    assert_eq!(fragments.len(), 3);
    assert!(fragments.iter().all(|f| f.threshold == 2));

    // Owner checks in for a while
    ledger.check_in(p.owner, id, day(80)).unwrap();
    ledger.check_in(p.owner, id, day(160)).unwrap();

    // ── 2. Owner goes silent; two guardians attest ──
    assert_eq!(ledger.status(id, day(200)).unwrap(), VaultStatus::Active);
    ledger.attest_death(p.guardians[0], id, day(200)).unwrap();
    ledger.attest_death(p.guardians[2], id, day(201)).unwrap();
    assert_eq!(ledger.vault(id).unwrap().status, VaultStatus::Triggered);

    // Owner never revokes; window closes
    assert_eq!(ledger.revoke_window_remaining(id, day(209)).unwrap(), Some(0));
    assert!(matches!(
        ledger.emergency_revoke(p.owner, id, day(209) + 1),
        Err(VaultError::RevokeWindowExpired { .. })
    ));

    // ── 3. Beneficiaries claim, guardians unlock ──
    ledger.claim(p.beneficiaries[0], id, day(210)).unwrap();
    assert_eq!(
        ledger.claim(p.beneficiaries[1], id, day(211)).unwrap(),
        VaultStatus::Claimed
    );

    let pass_a = derive_guardian_passphrase(MASTER, &contacts[0].email, 0).unwrap();
    let pass_c = derive_guardian_passphrase(MASTER, &contacts[2].email, 2).unwrap();
    let secret = splitter
        .reconstruct(
            id.0,
            &[
                (contacts[0].guardian_id.as_str(), pass_a.as_str()),
                (contacts[2].guardian_id.as_str(), pass_c.as_str()),
            ],
        )
        .unwrap();
    assert_eq!(secret.as_slice(), MASTER);

    // One guardian alone cannot
    assert!(matches!(
        splitter.reconstruct(id.0, &[(contacts[0].guardian_id.as_str(), pass_a.as_str())]),
        Err(FragmentError::Shamir(ShamirError::InsufficientShares { have: 1, need: 2 }))
    ));
}

#[test]
fn test_oracle_path_with_email_guardian() {
    let p = Parties::new();
    let dir = TempDir::new().unwrap();
    let mut ledger = test_ledger(&p, 5);
    let splitter = splitter(&dir);

    let id = create_test_vault(&mut ledger, &p, 30, 7, T0);
    let hash = p.email_hash(0);
    ledger
        .add_guardian_by_email_hash(p.owner, id, hash, day(1))
        .unwrap();
    let linked = ledger
        .link_email_hash_to_address(id, hash, &p.email_signature(0, id), day(2))
        .unwrap();
    assert_eq!(linked, p.email_guardian_address(0));

    // Four guardians: 3-of-4 split
    let mut contacts = guardian_contacts(&p);
    contacts.push(GuardianContact::new(
        GuardianId::Email(hash).to_string(),
        p.emails[0],
    ));
    let fragments = splitter.distribute(id.0, MASTER, &contacts, day(2)).unwrap();
    assert!(fragments.iter().all(|f| f.threshold == 3 && f.total == 4));

    assert_eq!(
        ledger.verify_death(p.oracle, p.owner, day(10)).unwrap(),
        DeathOutcome::Verified(vec![id])
    );
    assert!(matches!(
        ledger.claim(p.beneficiaries[0], id, day(12)),
        Err(VaultError::VerificationDelayPending { .. })
    ));
    ledger.update_all(day(15));
    assert_eq!(ledger.vault(id).unwrap().status, VaultStatus::ReadyForClaim);
    ledger.claim(p.beneficiaries[0], id, day(15)).unwrap();

    let unlocks: Vec<(String, String)> = [1usize, 2, 3]
        .iter()
        .map(|&i| {
            let pass = derive_guardian_passphrase(MASTER, &contacts[i].email, i as u32).unwrap();
            (contacts[i].guardian_id.clone(), pass.as_str().to_string())
        })
        .collect();
    let refs: Vec<(&str, &str)> = unlocks
        .iter()
        .map(|(g, pass)| (g.as_str(), pass.as_str()))
        .collect();
    assert_eq!(splitter.reconstruct(id.0, &refs).unwrap().as_slice(), MASTER);
}

#[test]
fn test_revoke_restores_owner_control() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);

    ledger.update_all(day(105));
    assert_eq!(ledger.vault(id).unwrap().status, VaultStatus::Triggered);
    ledger.emergency_revoke(p.owner, id, day(107)).unwrap();

    // Beneficiaries are shut out again
    assert!(matches!(
        ledger.claim(p.beneficiaries[0], id, day(108)),
        Err(VaultError::InvalidState { .. })
    ));
    assert_eq!(ledger.status(id, day(107 + 90)).unwrap(), VaultStatus::Active);
    assert_eq!(ledger.status(id, day(107 + 91)).unwrap(), VaultStatus::Warning);
}

#[test]
fn test_many_vaults_independent() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let a = create_test_vault(&mut ledger, &p, 30, 7, T0);
    let b = create_test_vault(&mut ledger, &p, 365, 90, T0);
    assert_eq!(ledger.vaults_of(&p.owner), vec![a, b]);
    assert_eq!(a, VaultId(1));

    let changes = ledger.update_all(day(40));
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].vault_id, a);
    assert_eq!(ledger.vault(b).unwrap().status, VaultStatus::Active);

    // The oracle sweeps up every remaining vault of the owner
    assert_eq!(
        ledger.verify_death(p.oracle, p.owner, day(41)).unwrap(),
        DeathOutcome::Verified(vec![a, b])
    );
    assert_eq!(ledger.vault(a).unwrap().status, VaultStatus::Triggered);
    assert_eq!(ledger.vault(b).unwrap().status, VaultStatus::ReadyForClaim);
}

#[test]
fn test_24_byte_secret_two_of_three() {
    let secret: Vec<u8> = (0u8..24).map(|i| i.wrapping_mul(37).wrapping_add(11)).collect();
    let shares = split_secret(&secret, 2, 3).unwrap();

    for (i, j) in [(0, 1), (0, 2), (1, 2), (2, 0)] {
        let pair = [shares[i].clone(), shares[j].clone()];
        assert_eq!(combine_shares(&pair).unwrap().as_slice(), secret.as_slice());
    }
    for share in &shares {
        assert!(combine_shares(std::slice::from_ref(share)).is_err());
        assert_ne!(share.data.as_slice(), secret.as_slice());
    }
}
