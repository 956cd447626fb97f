//! Heirloom Core
//!
//! Shared identity types and cryptographic building blocks for Heirloom.
//!
//! # Identities
//!
//! Every party (owner, guardian, beneficiary, oracle) is an [`Address`]:
//! the last 20 bytes of SHA-256 over a secp256k1 public key. Email-bound
//! guardians are known only by an [`EmailHash`] until they prove control
//! of an address with a recoverable signature over a canonical
//! (vault id, email hash) message.
//!
//! # Encrypted Storage
//!
//! Guardian shares are encrypted at rest using Argon2id + AES-256-GCM
//! under a passphrase (see [`crypto`]).

pub mod crypto;
pub mod identity;

pub use crypto::{decrypt_bytes, encrypt_bytes, CryptoError, EncryptedBlob, KdfParams};
pub use identity::{
    binding_message, recover_binding_signer, sign_binding, Address, BindingSignature, EmailHash,
    IdentityError, MetadataHash,
};
