//! Security-specific tests.
//!
//! These tests verify:
//! 1. Encrypted fragments reject wrong passphrases and tampering
//! 2. Malformed inputs are rejected without panicking
//! 3. Binding signatures cannot be replayed across vaults or email hashes
//! 4. Unauthorized callers cannot move a vault, and failures leave no trace

use heirloom_core::{
    decrypt_bytes, encrypt_bytes, recover_binding_signer, sign_binding, Address,
    BindingSignature, EmailHash, EncryptedBlob, KdfParams,
};
use heirloom_shamir::{
    open_fragment, seal_fragments, Fragment, FragmentError, GuardianContact, Share,
};
use heirloom_vault::test_utils::{create_test_vault, day, test_keypair, test_ledger, Parties, T0};
use heirloom_vault::{ErrorKind, VaultError, VaultStatus};
use rand::RngCore;

fn fast() -> KdfParams {
    KdfParams::insecure_fast()
}

// ============================================================================
// 1. Fragment Encryption
// ============================================================================

#[test]
fn test_wrong_passphrase_fails_decryption() {
    let encrypted = encrypt_bytes(&[0xAB; 33], "correct horse battery staple", fast()).unwrap();
    assert!(decrypt_bytes(&encrypted, "wrong horse battery staple").is_err());
}

#[test]
fn test_tampered_regions_fail_decryption() {
    let password = "test password";
    let encrypted = encrypt_bytes(&[0x42; 33], password, fast()).unwrap();
    let bytes = encrypted.to_bytes();

    // salt starts after the 13-byte header, nonce after the salt, then ciphertext
    for offset in [13, 29, 41, bytes.len() - 1] {
        let mut tampered = bytes.clone();
        tampered[offset] ^= 0xFF;
        let blob = EncryptedBlob::from_bytes(&tampered).unwrap();
        assert!(
            decrypt_bytes(&blob, password).is_err(),
            "tampering at byte {} went unnoticed",
            offset
        );
    }
}

#[test]
fn test_blob_header_validation() {
    let encrypted = encrypt_bytes(&[1; 16], "pw", fast()).unwrap();
    let bytes = encrypted.to_bytes();

    let mut bad_version = bytes.clone();
    bad_version[0] = 9;
    assert!(EncryptedBlob::from_bytes(&bad_version).is_err());

    // Absurd memory cost must not reach Argon2
    let mut huge_m_cost = bytes.clone();
    huge_m_cost[1..5].copy_from_slice(&u32::MAX.to_be_bytes());
    assert!(EncryptedBlob::from_bytes(&huge_m_cost).is_err());

    assert!(EncryptedBlob::from_bytes(&bytes[..20]).is_err());
    assert!(EncryptedBlob::from_bytes(&[]).is_err());
}

#[test]
fn test_fragment_cannot_be_opened_by_other_guardian() {
    let guardians = vec![
        GuardianContact::new("a", "a@example.com"),
        GuardianContact::new("b", "b@example.com"),
        GuardianContact::new("c", "c@example.com"),
    ];
    let master = b"master secret material";
    let fragments = seal_fragments(1, master, &guardians, fast(), T0).unwrap();

    let pass_b = fragments[1].derivation.derive(master, "b@example.com").unwrap();
    assert!(open_fragment(&fragments[1], &pass_b).is_ok());
    assert!(matches!(
        open_fragment(&fragments[0], &pass_b),
        Err(FragmentError::Crypto(_))
    ));
}

#[test]
fn test_fragment_json_never_contains_plain_share() {
    let guardians = vec![
        GuardianContact::new("a", "a@example.com"),
        GuardianContact::new("b", "b@example.com"),
        GuardianContact::new("c", "c@example.com"),
    ];
    let master = b"MASTER-SECRET-DO-NOT-LEAK";
    let fragments = seal_fragments(7, master, &guardians, fast(), T0).unwrap();
    for fragment in &fragments {
        let json = fragment.to_json().unwrap();
        assert!(!json.contains("MASTER-SECRET"));
        assert!(!json.contains("@example.com"));
    }
}

// ============================================================================
// 2. Malformed Inputs
// ============================================================================

#[test]
fn test_random_bytes_never_panic() {
    let mut rng = rand::thread_rng();
    for len in [0usize, 1, 2, 3, 17, 41, 57, 58, 65, 66, 200] {
        let mut buf = vec![0u8; len];
        rng.fill_bytes(&mut buf);
        let _ = EncryptedBlob::from_bytes(&buf);
        let _ = Share::from_bytes(&buf);
        let _ = BindingSignature::from_slice(&buf);
        let _ = Fragment::from_json(&String::from_utf8_lossy(&buf));
    }
}

#[test]
fn test_malformed_identities_rejected() {
    for input in ["", "0x", "0x1234", "zz", &format!("0x{}", "g".repeat(40))] {
        assert!(input.parse::<Address>().is_err(), "accepted {:?}", input);
    }
    assert!("0x1234".parse::<EmailHash>().is_err());
    assert!(BindingSignature::from_slice(&[0u8; 64]).is_err());
}

#[test]
fn test_fragment_json_rejects_inconsistent_metadata() {
    let guardians = vec![
        GuardianContact::new("a", "a@example.com"),
        GuardianContact::new("b", "b@example.com"),
        GuardianContact::new("c", "c@example.com"),
    ];
    let fragments = seal_fragments(3, b"secret", &guardians, fast(), T0).unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&fragments[0].to_json().unwrap()).unwrap();
    value["threshold"] = serde_json::json!(9);
    assert!(Fragment::from_json(&value.to_string()).is_err());
}

// ============================================================================
// 3. Binding Signatures
// ============================================================================

#[test]
fn test_binding_signature_is_scoped() {
    let (sk, addr) = test_keypair(30);
    let hash = EmailHash::from_email("guardian@example.com");
    let sig = sign_binding(&sk, 5, &hash);

    assert_eq!(recover_binding_signer(5, &hash, &sig).unwrap(), addr);
    // Replayed against another vault or email: recovers someone else
    assert_ne!(recover_binding_signer(6, &hash, &sig).ok(), Some(addr));
    let other = EmailHash::from_email("other@example.com");
    assert_ne!(recover_binding_signer(5, &other, &sig).ok(), Some(addr));
}

#[test]
fn test_signature_replay_across_vaults_rejected() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let v1 = create_test_vault(&mut ledger, &p, 90, 14, T0);
    let v2 = create_test_vault(&mut ledger, &p, 90, 14, T0);
    let hash = p.email_hash(0);
    ledger.add_guardian_by_email_hash(p.owner, v1, hash, day(1)).unwrap();
    ledger.add_guardian_by_email_hash(p.owner, v2, hash, day(1)).unwrap();

    let sig_v1 = p.email_signature(0, v1);
    ledger.attest_death_by_email_hash(v1, hash, &sig_v1, day(2)).unwrap();
    ledger
        .link_email_hash_to_address(v2, hash, &p.email_signature(0, v2), day(2))
        .unwrap();

    // v1's signature does not verify as the guardian on v2
    let err = ledger
        .attest_death_by_email_hash(v2, hash, &sig_v1, day(3))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(ledger.attestation_count(v2).unwrap(), 0);
    assert_eq!(ledger.attestation_count(v1).unwrap(), 1);
}

#[test]
fn test_unregistered_email_hash_rejected() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);
    let err = ledger
        .attest_death_by_email_hash(id, p.email_hash(1), &p.email_signature(1, id), day(2))
        .unwrap_err();
    assert!(matches!(err, VaultError::Unauthorized(_)));
}

// ============================================================================
// 4. Authorization
// ============================================================================

#[test]
fn test_only_parties_can_act() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);
    let stranger = test_keypair(77).1;

    let checks: Vec<Result<(), VaultError>> = vec![
        ledger.check_in(stranger, id, day(1)),
        ledger.check_in(p.guardians[0], id, day(1)),
        ledger.attest_death(stranger, id, day(1)).map(|_| ()),
        ledger.attest_death(p.owner, id, day(1)).map(|_| ()),
        ledger.attest_death(p.beneficiaries[0], id, day(1)).map(|_| ()),
        ledger.verify_death(stranger, p.owner, day(1)).map(|_| ()),
        ledger.verify_death(p.admin, p.owner, day(1)).map(|_| ()),
        ledger.set_death_verification_delay(p.oracle, 0),
        ledger.set_oracle(p.owner, stranger),
        ledger
            .update_metadata(p.guardians[1], id, Default::default(), day(1)),
        ledger
            .add_guardian_by_email_hash(stranger, id, p.email_hash(0), day(1)),
    ];
    for result in checks {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Authorization);
    }
    assert_eq!(ledger.attestation_count(id).unwrap(), 0);
    assert_eq!(ledger.oracle().address(), p.oracle);
}

#[test]
fn test_claim_requires_beneficiary_even_when_triggered() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 30, 7, T0);
    ledger.update_all(day(40));
    assert_eq!(ledger.vault(id).unwrap().status, VaultStatus::Triggered);

    for caller in [p.owner, p.guardians[0], p.admin, p.oracle] {
        assert!(matches!(
            ledger.claim(caller, id, day(40)),
            Err(VaultError::Unauthorized(_))
        ));
    }
    assert!(ledger.claimed_by(id).unwrap().is_empty());
}

#[test]
fn test_failed_call_leaves_ledger_untouched() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 30, 7, T0);
    let before = serde_json::to_string(&ledger).unwrap();

    // Status would move to Warning on a successful call at day 31
    assert!(ledger.check_in(p.guardians[0], id, day(31)).is_err());
    assert!(ledger.claim(p.beneficiaries[0], id, day(31)).is_err());
    assert_eq!(serde_json::to_string(&ledger).unwrap(), before);
    assert_eq!(ledger.vault(id).unwrap().status, VaultStatus::Active);
}
