//! Heirloom Shamir Module
//!
//! Split a vault's master secret across its guardians so that a majority
//! of them can reconstruct it after a claim, and no minority learns
//! anything.
//!
//! # Pipeline
//!
//! ```text
//! master secret ──split──▶ share_1 .. share_N        (GF(256), M-of-N)
//!                            │
//!   HMAC(master, email_i, i) ─┤ passphrase_i
//!                            ▼
//!                   Argon2id + AES-256-GCM
//!                            │
//!                            ▼
//!                      Fragment_i ──▶ FragmentStore  (all or nothing)
//! ```
//!
//! Thresholds follow the guardian count: 3 → 2-of-3, 4 → 3-of-4,
//! 5 → 3-of-5.
//!
//! # Example
//!
//! ```
//! use heirloom_shamir::{split_secret, combine_shares};
//!
//! let secret = [0x42u8; 32];
//! let shares = split_secret(&secret, 2, 3).unwrap();
//! let recovered = combine_shares(&shares[1..3]).unwrap();
//! assert_eq!(recovered.as_slice(), &secret);
//! ```

pub mod fragment;
pub mod gf256;
pub mod passphrase;
pub mod shamir;
pub mod splitter;
pub mod store;

// Re-exports
pub use fragment::{open_fragment, seal_fragments, Fragment, GuardianContact};
pub use passphrase::{derive_guardian_passphrase, PassphraseDerivation, PASSPHRASE_VERSION};
pub use shamir::{combine_shares, split_secret, SchemeParams, Share};
pub use splitter::SecretSplitter;
pub use store::{FileFragmentStore, FragmentStore, MemoryFragmentStore};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShamirError {
    #[error("Invalid threshold: need at least 2")]
    InvalidThreshold,
    #[error("Threshold exceeds share count")]
    ThresholdExceedsShares,
    #[error("Not enough shares to reconstruct: have {have}, need {need}")]
    InsufficientShares { have: usize, need: usize },
    #[error("Invalid share format: {0}")]
    InvalidShare(String),
    #[error("Unsupported guardian count {0}: need 3 to 5")]
    UnsupportedGuardianCount(usize),
}

#[derive(Error, Debug)]
pub enum FragmentError {
    #[error(transparent)]
    Shamir(#[from] ShamirError),
    #[error(transparent)]
    Crypto(#[from] heirloom_core::CryptoError),
    #[error("Invalid guardian set: {0}")]
    InvalidGuardians(String),
    #[error("Duplicate guardian: {0}")]
    DuplicateGuardian(String),
    #[error("Fragments already exist for vault {0}")]
    FragmentsExist(u64),
    #[error("No fragments for vault {0}")]
    NotFound(u64),
    #[error("Unknown guardian: {0}")]
    UnknownGuardian(String),
    #[error("Fragment mismatch: {0}")]
    Mismatch(String),
    #[error("Fragment store error: {0}")]
    Store(String),
    #[error("Fragment store lock poisoned")]
    LockPoisoned,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
