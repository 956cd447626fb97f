//! Heirloom Vault
//!
//! The on-ledger half of Heirloom: inheritance vaults that trigger when the
//! owner stops checking in or when guardians attest to their death, and
//! release to beneficiaries once an oracle has verified the death.
//!
//! # Lifecycle
//!
//! ```text
//!            check_in                     guardian quorum
//!   Active ◀──────────── Warning           (any live state)
//!     │    deadline passed  ▲                     │
//!     └─────────────────────┘                     ▼
//!     │                                       Triggered ──emergency_revoke──▶ Active
//!     │ deadline + grace passed                   │        (within 7 days)
//!     └──────────────────────────────────────────▶│
//!                                                 │ verify_death
//!                                                 ▼
//!                                           DeathVerified
//!                                                 │ delay elapsed
//!                                                 ▼
//!                                           ReadyForClaim ──last claim──▶ Claimed
//! ```
//!
//! # Example
//!
//! ```
//! use heirloom_vault::test_utils::{create_test_vault, day, test_ledger, Parties, T0};
//! use heirloom_vault::VaultStatus;
//!
//! let p = Parties::new();
//! let mut ledger = test_ledger(&p, 0);
//! let id = create_test_vault(&mut ledger, &p, 30, 7, T0);
//!
//! assert_eq!(ledger.status(id, day(31)).unwrap(), VaultStatus::Warning);
//! ledger.check_in(p.owner, id, day(31)).unwrap();
//! assert_eq!(ledger.status(id, day(31)).unwrap(), VaultStatus::Active);
//! ```

pub mod attestation;
pub mod error;
pub mod events;
pub mod guardian;
pub mod ledger;
pub mod lifecycle;
pub mod oracle;
pub mod recovery;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

pub use attestation::{AttestationQuorum, AttestationRecord};
pub use error::{ErrorKind, VaultError};
pub use events::{StatusChange, VaultEvent};
pub use guardian::{Guardian, GuardianId, GuardianRegistry};
pub use ledger::{DeathOutcome, VaultLedger};
pub use lifecycle::{claimable_at, evaluate, Deadlines, Evaluation, Vault};
pub use oracle::{DeathOracle, OracleQuorum, OracleVote, TrustedOracle};
pub use recovery::{RecoveryRequest, RecoveryTimelock, MAX_RECOVERY_DELAY, MIN_RECOVERY_DELAY};
pub use types::*;
