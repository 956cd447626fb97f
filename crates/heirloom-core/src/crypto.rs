//! Cryptographic utilities
//!
//! Passphrase-based encryption for guardian shares using Argon2id + AES-256-GCM.
//!
//! # Security Notes
//!
//! - Argon2id is memory-hard (resistant to GPU/ASIC attacks)
//! - AES-256-GCM provides authenticated encryption
//! - Each encryption uses a random salt and nonce
//! - The passphrase is never stored
//! - KDF parameters travel with the blob so a fragment can be opened
//!   years later even if the defaults change

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// Blob format version
const FORMAT_VERSION: u8 = 1;

/// Argon2id output length (256 bits for AES-256)
const ARGON2_OUTPUT_LEN: usize = 32;

/// Salt length for Argon2
const SALT_LEN: usize = 16;

/// Nonce length for AES-256-GCM
const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length
const TAG_LEN: usize = 16;

/// version (1) + m_cost (4) + t_cost (4) + p_cost (4)
const PARAMS_LEN: usize = 13;

const HEADER_LEN: usize = PARAMS_LEN + SALT_LEN + NONCE_LEN;

/// Upper bounds accepted when parsing untrusted blobs, so a crafted header
/// cannot make decryption allocate unbounded memory.
const MAX_M_COST: u32 = 1 << 20; // 1 GiB
const MAX_T_COST: u32 = 16;
const MAX_P_COST: u32 = 16;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("Invalid ciphertext format")]
    InvalidFormat,
    #[error("Unsupported blob version: {0}")]
    UnsupportedVersion(u8),
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub m_cost: u32,
    /// Iterations
    pub t_cost: u32,
    /// Parallelism
    pub p_cost: u32,
}

impl Default for KdfParams {
    /// OWASP recommendations for 2024+: 64 MiB, 3 iterations, 4 lanes.
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl KdfParams {
    /// Create and validate a parameter set.
    pub fn new(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, CryptoError> {
        let params = Self {
            m_cost,
            t_cost,
            p_cost,
        };
        params.validate()?;
        Ok(params)
    }

    /// Cheap parameters for tests and fuzzing. Never use for real shares.
    pub fn insecure_fast() -> Self {
        Self {
            m_cost: 1024,
            t_cost: 1,
            p_cost: 1,
        }
    }

    /// Check the parameters against Argon2's limits and our own ceilings.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.m_cost > MAX_M_COST || self.t_cost > MAX_T_COST || self.p_cost > MAX_P_COST {
            return Err(CryptoError::KeyDerivationFailed(
                "KDF parameters exceed allowed maximum".into(),
            ));
        }
        self.to_argon2().map(|_| ())
    }

    fn to_argon2(self) -> Result<Params, CryptoError> {
        Params::new(
            self.m_cost,
            self.t_cost,
            self.p_cost,
            Some(ARGON2_OUTPUT_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))
    }
}

/// Encrypted blob format:
/// [version (1)][m_cost (4)][t_cost (4)][p_cost (4)][salt (16)][nonce (12)][ciphertext + tag]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    /// Argon2id parameters used to derive the key
    params: KdfParams,
    /// Salt used for Argon2id key derivation
    salt: [u8; SALT_LEN],
    /// Nonce used for AES-256-GCM
    nonce: [u8; NONCE_LEN],
    /// Encrypted payload + authentication tag
    ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// KDF parameters this blob was sealed with.
    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// Length of the plaintext this blob decrypts to.
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len() - TAG_LEN
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&self.params.m_cost.to_be_bytes());
        bytes.extend_from_slice(&self.params.t_cost.to_be_bytes());
        bytes.extend_from_slice(&self.params.p_cost.to_be_bytes());
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        // Minimum size: header + at least 1 byte ciphertext + 16 byte tag
        if bytes.len() < HEADER_LEN + TAG_LEN + 1 {
            return Err(CryptoError::InvalidFormat);
        }
        if bytes[0] != FORMAT_VERSION {
            return Err(CryptoError::UnsupportedVersion(bytes[0]));
        }

        let read_u32 = |at: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[at..at + 4]);
            u32::from_be_bytes(buf)
        };
        let params = KdfParams {
            m_cost: read_u32(1),
            t_cost: read_u32(5),
            p_cost: read_u32(9),
        };
        params.validate().map_err(|_| CryptoError::InvalidFormat)?;

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        salt.copy_from_slice(&bytes[PARAMS_LEN..PARAMS_LEN + SALT_LEN]);
        nonce.copy_from_slice(&bytes[PARAMS_LEN + SALT_LEN..HEADER_LEN]);
        let ciphertext = bytes[HEADER_LEN..].to_vec();

        Ok(Self {
            params,
            salt,
            nonce,
            ciphertext,
        })
    }
}

/// Derive an encryption key from a passphrase using Argon2id
fn derive_key(
    passphrase: &str,
    salt: &[u8; SALT_LEN],
    params: KdfParams,
) -> Result<Zeroizing<[u8; ARGON2_OUTPUT_LEN]>, CryptoError> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

    let mut key = Zeroizing::new([0u8; ARGON2_OUTPUT_LEN]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key[..])
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(key)
}

/// Encrypt arbitrary bytes under a passphrase.
///
/// Each call generates a new random salt and nonce.
pub fn encrypt_bytes(
    plaintext: &[u8],
    passphrase: &str,
    params: KdfParams,
) -> Result<EncryptedBlob, CryptoError> {
    if plaintext.is_empty() {
        return Err(CryptoError::EncryptionFailed("Empty plaintext".into()));
    }

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let nonce_arr = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&nonce_arr);

    let key = derive_key(passphrase, &salt, params)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedBlob {
        params,
        salt,
        nonce,
        ciphertext,
    })
}

/// Decrypt a blob with a passphrase
///
/// # Errors
/// Returns error if the passphrase is wrong or the blob was tampered with
pub fn decrypt_bytes(
    encrypted: &EncryptedBlob,
    passphrase: &str,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let key = derive_key(passphrase, &encrypted.salt, encrypted.params)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&encrypted.nonce),
            encrypted.ciphertext.as_slice(),
        )
        .map_err(|_| {
            CryptoError::DecryptionFailed("Invalid passphrase or corrupted data".to_string())
        })?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> KdfParams {
        KdfParams::insecure_fast()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let share = [42u8; 33];
        let passphrase = "correct horse battery staple";

        let encrypted = encrypt_bytes(&share, passphrase, fast()).unwrap();
        let decrypted = decrypt_bytes(&encrypted, passphrase).unwrap();

        assert_eq!(share.as_slice(), decrypted.as_slice());
        assert_eq!(encrypted.plaintext_len(), 33);
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let encrypted = encrypt_bytes(&[7u8; 16], "right", fast()).unwrap();
        assert!(decrypt_bytes(&encrypted, "wrong").is_err());
    }

    #[test]
    fn test_different_encryptions_different_ciphertext() {
        let data = [42u8; 32];
        let encrypted1 = encrypt_bytes(&data, "same", fast()).unwrap();
        let encrypted2 = encrypt_bytes(&data, "same", fast()).unwrap();

        // Random salt and nonce
        assert_ne!(encrypted1.to_bytes(), encrypted2.to_bytes());
        assert_eq!(
            decrypt_bytes(&encrypted1, "same").unwrap(),
            decrypt_bytes(&encrypted2, "same").unwrap()
        );
    }

    #[test]
    fn test_serialization_preserves_params() {
        let params = KdfParams::new(2048, 2, 1).unwrap();
        let encrypted = encrypt_bytes(b"fragment", "pw", params).unwrap();
        let restored = EncryptedBlob::from_bytes(&encrypted.to_bytes()).unwrap();

        assert_eq!(restored.params(), params);
        assert_eq!(decrypt_bytes(&restored, "pw").unwrap().as_slice(), b"fragment");
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let encrypted = encrypt_bytes(&[1u8; 24], "pw", fast()).unwrap();
        let mut bytes = encrypted.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let tampered = EncryptedBlob::from_bytes(&bytes).unwrap();
        assert!(decrypt_bytes(&tampered, "pw").is_err());
    }

    #[test]
    fn test_from_bytes_rejects_short_input() {
        assert!(matches!(
            EncryptedBlob::from_bytes(&[FORMAT_VERSION; 10]),
            Err(CryptoError::InvalidFormat)
        ));
    }

    #[test]
    fn test_from_bytes_rejects_unknown_version() {
        let encrypted = encrypt_bytes(&[1u8; 16], "pw", fast()).unwrap();
        let mut bytes = encrypted.to_bytes();
        bytes[0] = 9;
        assert!(matches!(
            EncryptedBlob::from_bytes(&bytes),
            Err(CryptoError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_oversized_memory_cost() {
        let encrypted = encrypt_bytes(&[1u8; 16], "pw", fast()).unwrap();
        let mut bytes = encrypted.to_bytes();
        bytes[1..5].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(EncryptedBlob::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_empty_plaintext_rejected() {
        assert!(encrypt_bytes(&[], "pw", fast()).is_err());
    }

    #[test]
    fn test_default_params_are_valid() {
        assert!(KdfParams::default().validate().is_ok());
        assert!(KdfParams::new(0, 0, 0).is_err());
    }
}
