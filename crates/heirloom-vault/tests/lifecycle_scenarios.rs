//! Vault lifecycle scenarios driven through the public ledger API.
//!
//! 1. 90d interval + 14d grace, no check-in: Warning at day 91, Triggered at day 105
//! 2. Two guardians attest on day 10: Triggered immediately
//! 3. Owner revokes two days after a time trigger: back to Active
//! 4. Owner revokes on day 112, the window's last day: back to Active.
//!    On day 113 (eight days after the trigger): RevokeWindowExpired
//! 5. Linked email guardian cannot be impersonated by another key
//!
//! Plus the oracle path with a verification delay through to Claimed.

use heirloom_core::sign_binding;
use heirloom_vault::test_utils::{create_test_vault, day, test_keypair, test_ledger, Parties, T0};
use heirloom_vault::{
    DeathOutcome, ErrorKind, GuardianId, VaultError, VaultEvent, VaultStatus, DAY,
};

#[test]
fn test_time_path_warning_then_triggered() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);

    assert_eq!(ledger.status(id, day(90)).unwrap(), VaultStatus::Active);
    assert_eq!(ledger.status(id, day(91)).unwrap(), VaultStatus::Warning);
    assert_eq!(ledger.status(id, day(104)).unwrap(), VaultStatus::Warning);
    assert_eq!(ledger.status(id, day(105)).unwrap(), VaultStatus::Triggered);

    // Reads never persist
    assert_eq!(ledger.vault(id).unwrap().status, VaultStatus::Active);

    assert_eq!(ledger.update_status(id, day(105)).unwrap(), VaultStatus::Triggered);
    assert_eq!(ledger.vault(id).unwrap().triggered_at, Some(day(105)));
}

#[test]
fn test_guardian_quorum_triggers_early() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);

    assert_eq!(ledger.attest_death(p.guardians[0], id, day(10)).unwrap(), 1);
    assert_eq!(ledger.status(id, day(10)).unwrap(), VaultStatus::Active);
    assert_eq!(ledger.attest_death(p.guardians[1], id, day(10)).unwrap(), 2);

    assert_eq!(ledger.vault(id).unwrap().status, VaultStatus::Triggered);
    assert_eq!(ledger.vault(id).unwrap().triggered_at, Some(day(10)));
    assert_eq!(
        ledger.revoke_window_remaining(id, day(10)).unwrap(),
        Some(7 * DAY)
    );

    // Beneficiaries can claim straight away on the trigger path
    assert_eq!(
        ledger.claim(p.beneficiaries[0], id, day(11)).unwrap(),
        VaultStatus::Triggered
    );
}

#[test]
fn test_revoke_inside_window() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);

    ledger.update_all(day(105));
    assert_eq!(ledger.vault(id).unwrap().status, VaultStatus::Triggered);

    ledger.emergency_revoke(p.owner, id, day(107)).unwrap();
    assert_eq!(ledger.status(id, day(107)).unwrap(), VaultStatus::Active);
    assert_eq!(ledger.attestation_count(id).unwrap(), 0);

    let deadlines = ledger.deadlines(id, day(107)).unwrap();
    assert_eq!(deadlines.check_in_deadline, day(107 + 90));
    assert_eq!(deadlines.trigger_at, day(107 + 90 + 14));
}

#[test]
fn test_revoke_on_last_day_of_window() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);

    ledger.update_all(day(105));
    assert_eq!(
        ledger.revoke_window_remaining(id, day(112)).unwrap(),
        Some(0)
    );
    ledger.emergency_revoke(p.owner, id, day(112)).unwrap();
    assert_eq!(ledger.vault(id).unwrap().status, VaultStatus::Active);
}

#[test]
fn test_revoke_after_window_fails() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);

    ledger.update_all(day(105));
    let before = serde_json::to_string(&ledger).unwrap();

    let err = ledger.emergency_revoke(p.owner, id, day(113)).unwrap_err();
    assert_eq!(err, VaultError::RevokeWindowExpired { closed_at: day(112) });
    assert_eq!(err.kind(), ErrorKind::Timing);
    assert_eq!(serde_json::to_string(&ledger).unwrap(), before);

    // Still no way back via check-in either
    assert!(matches!(
        ledger.check_in(p.owner, id, day(113)),
        Err(VaultError::InvalidState { .. })
    ));
}

#[test]
fn test_email_guardian_link_cannot_be_hijacked() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);
    let hash = p.email_hash(0);

    ledger
        .add_guardian_by_email_hash(p.owner, id, hash, day(1))
        .unwrap();
    let count = ledger
        .attest_death_by_email_hash(id, hash, &p.email_signature(0, id), day(2))
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(
        ledger.vault(id).unwrap().guardians.linked_address(&hash).unwrap(),
        Some(p.email_guardian_address(0))
    );

    let (intruder, _) = test_keypair(99);
    let forged = sign_binding(&intruder, id.0, &hash);
    let err = ledger
        .attest_death_by_email_hash(id, hash, &forged, day(5))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(ledger.attestation_count(id).unwrap(), 1);

    // Mixed kinds share one counter
    assert_eq!(ledger.attest_death(p.guardians[2], id, day(5)).unwrap(), 2);
    assert_eq!(ledger.vault(id).unwrap().status, VaultStatus::Triggered);
}

#[test]
fn test_cooldown_survives_check_in() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);

    ledger.attest_death(p.guardians[0], id, day(10)).unwrap();
    ledger.check_in(p.owner, id, day(10) + 60).unwrap();
    assert_eq!(ledger.attestation_count(id).unwrap(), 0);

    assert_eq!(
        ledger.attest_death(p.guardians[0], id, day(10) + 120),
        Err(VaultError::AttestationCooldown { retry_at: day(11) })
    );
    assert_eq!(ledger.attest_death(p.guardians[0], id, day(11)).unwrap(), 1);

    let record = ledger
        .attestation_of(id, &GuardianId::Address(p.guardians[0]))
        .unwrap();
    assert!(record.has_attested);
    assert_eq!(record.last_attested_at, Some(day(11)));
}

#[test]
fn test_oracle_path_with_delay_to_claimed() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 3);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);

    assert_eq!(
        ledger.verify_death(p.oracle, p.owner, day(20)).unwrap(),
        DeathOutcome::Verified(vec![id])
    );
    assert_eq!(ledger.vault(id).unwrap().status, VaultStatus::DeathVerified);
    assert_eq!(ledger.claimable_at(id, day(20)).unwrap(), Some(day(23)));
    assert_eq!(
        ledger.verify_death(p.oracle, p.owner, day(21)),
        Err(VaultError::DeathAlreadyVerified)
    );

    assert_eq!(
        ledger.claim(p.beneficiaries[0], id, day(22)),
        Err(VaultError::VerificationDelayPending { ready_at: day(23) })
    );

    assert_eq!(
        ledger.claim(p.beneficiaries[0], id, day(23)).unwrap(),
        VaultStatus::ReadyForClaim
    );
    assert_eq!(
        ledger.claim(p.beneficiaries[0], id, day(24)),
        Err(VaultError::AlreadyClaimed)
    );
    assert_eq!(
        ledger.claim(p.beneficiaries[1], id, day(24)).unwrap(),
        VaultStatus::Claimed
    );
    assert_eq!(ledger.claimable_at(id, day(24)).unwrap(), None);
    assert_eq!(ledger.claimed_by(id).unwrap().len(), 2);

    let changes: Vec<_> = ledger
        .take_events()
        .iter()
        .filter_map(|e| e.as_status_change().map(|c| c.to))
        .collect();
    assert_eq!(
        changes,
        vec![
            VaultStatus::DeathVerified,
            VaultStatus::ReadyForClaim,
            VaultStatus::Claimed
        ]
    );
}

#[test]
fn test_failed_calls_emit_nothing() {
    let p = Parties::new();
    let mut ledger = test_ledger(&p, 0);
    let id = create_test_vault(&mut ledger, &p, 90, 14, T0);
    ledger.take_events();

    assert!(ledger.check_in(p.guardians[0], id, day(1)).is_err());
    assert!(ledger.attest_death(p.beneficiaries[0], id, day(1)).is_err());
    assert!(ledger.claim(p.beneficiaries[0], id, day(1)).is_err());
    assert!(ledger.verify_death(p.admin, p.owner, day(1)).is_err());
    assert!(ledger.take_events().is_empty());

    ledger.check_in(p.owner, id, day(1)).unwrap();
    let events = ledger.take_events();
    assert!(matches!(events[0], VaultEvent::CheckedIn { .. }));
}
