//! Vault errors
//!
//! Every failed ledger call returns one of these and leaves the ledger
//! untouched. [`VaultError::kind`] groups variants for callers that only
//! care about the category (e.g. to pick an HTTP status).

use crate::types::{VaultId, VaultStatus};
use heirloom_core::{Address, IdentityError};
use thiserror::Error;

/// Broad error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation is not valid in the vault's current status
    State,
    /// Caller is not the owner/guardian/beneficiary/oracle/admin
    Authorization,
    /// Out-of-range durations or counts, malformed or duplicate parties
    Validation,
    /// A time window has not opened yet or has already closed
    Timing,
    /// Signature or address recovery failure
    Crypto,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    // ========================================================================
    // State
    // ========================================================================
    #[error("Cannot {operation} while vault is {status}")]
    InvalidState {
        operation: &'static str,
        status: VaultStatus,
    },
    #[error("Beneficiary has already claimed")]
    AlreadyClaimed,
    #[error("Guardian has already attested")]
    AlreadyAttested,
    #[error("Death already verified")]
    DeathAlreadyVerified,
    #[error("Email hash is already linked to an address")]
    EmailAlreadyLinked,
    #[error("A recovery request is already pending")]
    RecoveryPending,
    #[error("No recovery request is pending")]
    NoRecoveryPending,
    #[error("Recovery request lacks guardian approvals")]
    RecoveryNotApproved,

    // ========================================================================
    // Authorization
    // ========================================================================
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    // ========================================================================
    // Validation
    // ========================================================================
    #[error("Vault not found: {0}")]
    VaultNotFound(VaultId),
    #[error("No vaults for owner {0}")]
    OwnerNotFound(Address),
    #[error("Check-in interval {0}s outside 30..=365 days")]
    InvalidCheckInInterval(u64),
    #[error("Grace period {0}s outside 7..=90 days")]
    InvalidGracePeriod(u64),
    #[error("Need 1 to 10 beneficiaries, got {0}")]
    InvalidBeneficiaryCount(usize),
    #[error("Need exactly 3 address guardians, got {0}")]
    InvalidGuardianCount(usize),
    #[error("Vault already has the maximum of 5 guardians")]
    TooManyGuardians,
    #[error("Duplicate beneficiary: {0}")]
    DuplicateBeneficiary(Address),
    #[error("Duplicate guardian: {0}")]
    DuplicateGuardian(String),
    #[error("Address {0} cannot be both guardian and beneficiary")]
    GuardianIsBeneficiary(Address),
    #[error("Email hash is not a guardian of this vault")]
    UnknownEmailGuardian,
    #[error("Invalid party: {0}")]
    InvalidParty(&'static str),
    #[error("Death verification delay {0}s exceeds 90 days")]
    DelayTooLong(u64),
    #[error("Invalid oracle set: {0}")]
    InvalidOracleSet(String),
    #[error("Oracle {0} already confirmed this death")]
    DuplicateConfirmation(Address),
    #[error("Recovery delay {0}s outside 1..=90 days")]
    InvalidRecoveryDelay(u64),
    #[error("Inconsistent ledger state: {0}")]
    CorruptState(String),

    // ========================================================================
    // Timing
    // ========================================================================
    #[error("Attestation cooldown active until {retry_at}")]
    AttestationCooldown { retry_at: u64 },
    #[error("Emergency revoke window closed at {closed_at}")]
    RevokeWindowExpired { closed_at: u64 },
    #[error("Death verification delay pending until {ready_at}")]
    VerificationDelayPending { ready_at: u64 },
    #[error("Recovery timelock pending until {ready_at}")]
    TimelockPending { ready_at: u64 },

    // ========================================================================
    // Crypto
    // ========================================================================
    #[error(transparent)]
    Crypto(#[from] IdentityError),
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        use VaultError::*;
        match self {
            InvalidState { .. }
            | AlreadyClaimed
            | AlreadyAttested
            | DeathAlreadyVerified
            | EmailAlreadyLinked
            | RecoveryPending
            | NoRecoveryPending
            | RecoveryNotApproved => ErrorKind::State,
            Unauthorized(_) => ErrorKind::Authorization,
            VaultNotFound(_)
            | OwnerNotFound(_)
            | InvalidCheckInInterval(_)
            | InvalidGracePeriod(_)
            | InvalidBeneficiaryCount(_)
            | InvalidGuardianCount(_)
            | TooManyGuardians
            | DuplicateBeneficiary(_)
            | DuplicateGuardian(_)
            | GuardianIsBeneficiary(_)
            | UnknownEmailGuardian
            | InvalidParty(_)
            | DelayTooLong(_)
            | InvalidOracleSet(_)
            | DuplicateConfirmation(_)
            | InvalidRecoveryDelay(_)
            | CorruptState(_) => ErrorKind::Validation,
            AttestationCooldown { .. }
            | RevokeWindowExpired { .. }
            | VerificationDelayPending { .. }
            | TimelockPending { .. } => ErrorKind::Timing,
            Crypto(_) => ErrorKind::Crypto,
        }
    }
}
