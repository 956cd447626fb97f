//! Party identities and email-binding signatures
//!
//! An [`Address`] is derived from a secp256k1 public key. An email guardian
//! proves control of an address by signing the canonical binding message
//! for `(vault id, email hash)`; the ledger recovers the signer from the
//! signature alone, so the guardian never has to register a key up front.
//!
//! ```text
//! message = SHA-256("heirloom:email-binding:v1" || vault_id (u64 BE) || email_hash)
//! signature = compact (64 bytes) || recovery id (1 byte)
//! ```

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Domain separator for the email binding message
const BINDING_DOMAIN: &[u8] = b"heirloom:email-binding:v1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signer recovery failed: {0}")]
    RecoveryFailed(String),
}

/// Implement serde for a type through its `Display`/`FromStr` pair, so
/// identities serialize as strings and can key JSON maps.
macro_rules! string_serde {
    ($type:ty) => {
        impl Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> Result<$type, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                <$type>::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| e.to_string())?;
    if bytes.len() != N {
        return Err(format!("expected {} bytes, got {}", N, bytes.len()));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

// ============================================================================
// Address
// ============================================================================

/// A 20-byte party identity derived from a secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address. Never a valid party.
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Last 20 bytes of SHA-256 over the uncompressed key (sans prefix byte).
    pub fn from_public_key(pk: &PublicKey) -> Self {
        let uncompressed = pk.serialize_uncompressed();
        let digest = Sha256::digest(&uncompressed[1..]);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Self(out)
    }

    pub fn from_secret_key(sk: &SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        Self::from_public_key(&sk.public_key(&secp))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s)
            .map(Self)
            .map_err(IdentityError::InvalidAddress)
    }
}

string_serde!(Address);

// ============================================================================
// 32-byte hashes
// ============================================================================

macro_rules! hash32 {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; 32]);

        impl $name {
            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = IdentityError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<32>(s)
                    .map(Self)
                    .map_err(IdentityError::InvalidHash)
            }
        }

        string_serde!($name);
    };
}

hash32!(
    /// SHA-256 of a normalized (trimmed, lowercased) email address.
    EmailHash
);

hash32!(
    /// Opaque owner-supplied digest of off-ledger vault metadata.
    MetadataHash
);

impl EmailHash {
    /// Hash an email address after trimming and lowercasing it.
    pub fn from_email(email: &str) -> Self {
        let normalized = email.trim().to_lowercase();
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(normalized.as_bytes()));
        Self(out)
    }
}

impl MetadataHash {
    /// Hash arbitrary metadata bytes.
    pub fn digest(data: &[u8]) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(data));
        Self(out)
    }
}

// ============================================================================
// Binding signatures
// ============================================================================

/// Recoverable ECDSA signature: 64-byte compact form followed by the recovery id.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BindingSignature([u8; 65]);

impl BindingSignature {
    pub fn from_bytes(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentityError> {
        let arr: [u8; 65] = bytes.try_into().map_err(|_| {
            IdentityError::InvalidSignature(format!("expected 65 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }
}

impl fmt::Display for BindingSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for BindingSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindingSignature({})", self)
    }
}

impl FromStr for BindingSignature {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<65>(s)
            .map(Self)
            .map_err(IdentityError::InvalidSignature)
    }
}

string_serde!(BindingSignature);

/// Canonical message binding an email hash to a vault.
pub fn binding_message(vault_id: u64, email_hash: &EmailHash) -> Message {
    let mut hasher = Sha256::new();
    hasher.update(BINDING_DOMAIN);
    hasher.update(vault_id.to_be_bytes());
    hasher.update(email_hash.as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    Message::from_digest(digest)
}

/// Sign the binding message for `(vault_id, email_hash)`.
pub fn sign_binding(sk: &SecretKey, vault_id: u64, email_hash: &EmailHash) -> BindingSignature {
    let secp = Secp256k1::signing_only();
    let msg = binding_message(vault_id, email_hash);
    let (rec_id, compact) = secp
        .sign_ecdsa_recoverable(&msg, sk)
        .serialize_compact();

    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&compact);
    out[64] = rec_id.to_i32() as u8;
    BindingSignature(out)
}

/// Recover the address that produced `signature` over the binding message.
///
/// A signature over a different vault id or email hash recovers to an
/// unrelated address rather than failing, so callers must compare the
/// result against the address they expect.
pub fn recover_binding_signer(
    vault_id: u64,
    email_hash: &EmailHash,
    signature: &BindingSignature,
) -> Result<Address, IdentityError> {
    let rec_id = RecoveryId::from_i32(signature.0[64] as i32)
        .map_err(|e| IdentityError::InvalidSignature(e.to_string()))?;
    let sig = RecoverableSignature::from_compact(&signature.0[..64], rec_id)
        .map_err(|e| IdentityError::InvalidSignature(e.to_string()))?;

    let secp = Secp256k1::verification_only();
    let msg = binding_message(vault_id, email_hash);
    let pk = secp
        .recover_ecdsa(&msg, &sig)
        .map_err(|e| IdentityError::RecoveryFailed(e.to_string()))?;

    Ok(Address::from_public_key(&pk))
}
