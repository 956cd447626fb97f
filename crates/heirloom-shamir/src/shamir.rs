//! Core Shamir's Secret Sharing implementation
//!
//! Split a secret into N shares where any M can reconstruct it. Each byte
//! of the secret gets its own random polynomial of degree M-1 over GF(256),
//! so the field is effectively sized to the secret length and fewer than M
//! shares reveal nothing about it.

use crate::gf256::{lagrange_interpolate, poly_eval};
use crate::ShamirError;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Largest number of shares GF(256) can address (x = 1..=255)
pub const MAX_SHARES: u8 = 255;

/// Split identifiers are 15 bits, as in SLIP-39.
const IDENTIFIER_MASK: u16 = 0x7FFF;

/// `index || threshold || identifier (u16 BE)`
const HEADER_LEN: usize = 4;

/// A single share of a secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// Share index (1..=N, never 0)
    pub index: u8,
    /// Shares needed to reconstruct
    pub threshold: u8,
    /// Random identifier shared by every share of one split
    pub identifier: u16,
    /// Share data (same length as original secret)
    pub data: Vec<u8>,
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .field("threshold", &self.threshold)
            .field("identifier", &self.identifier)
            .field("len", &self.data.len())
            .finish()
    }
}

impl Share {
    /// Encode as `index || threshold || identifier || data`.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(Vec::with_capacity(self.data.len() + HEADER_LEN));
        bytes.push(self.index);
        bytes.push(self.threshold);
        bytes.extend_from_slice(&self.identifier.to_be_bytes());
        bytes.extend_from_slice(&self.data);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ShamirError> {
        if bytes.len() <= HEADER_LEN {
            return Err(ShamirError::InvalidShare("Share too short".into()));
        }
        let share = Self {
            index: bytes[0],
            threshold: bytes[1],
            identifier: u16::from_be_bytes([bytes[2], bytes[3]]),
            data: bytes[HEADER_LEN..].to_vec(),
        };
        if share.index == 0 {
            return Err(ShamirError::InvalidShare("Share index 0".into()));
        }
        if share.threshold < 2 {
            return Err(ShamirError::InvalidThreshold);
        }
        if share.identifier & !IDENTIFIER_MASK != 0 {
            return Err(ShamirError::InvalidShare("Identifier out of range".into()));
        }
        Ok(share)
    }
}

/// Threshold scheme derived from a guardian count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeParams {
    /// Minimum shares needed to reconstruct (M)
    pub threshold: u8,
    /// Total shares to generate (N)
    pub total: u8,
}

impl SchemeParams {
    /// Guardian sets are 3–5 strong; a strict majority must cooperate.
    ///
    /// 3 → 2-of-3, 4 → 3-of-4, 5 → 3-of-5.
    pub fn for_guardians(count: usize) -> Result<Self, ShamirError> {
        if !(3..=5).contains(&count) {
            return Err(ShamirError::UnsupportedGuardianCount(count));
        }
        let total = count as u8;
        Ok(Self {
            threshold: total / 2 + 1,
            total,
        })
    }

    pub fn validate(&self) -> Result<(), ShamirError> {
        if self.threshold < 2 {
            return Err(ShamirError::InvalidThreshold);
        }
        if self.threshold > self.total {
            return Err(ShamirError::ThresholdExceedsShares);
        }
        Ok(())
    }
}

/// Split a secret into shares using Shamir's Secret Sharing
///
/// # Arguments
/// * `secret` - The secret bytes to split
/// * `threshold` - Minimum shares needed to reconstruct (M)
/// * `total` - Total shares to generate (N)
///
/// # Returns
/// Vector of N shares, any M of which can reconstruct the secret
pub fn split_secret(secret: &[u8], threshold: u8, total: u8) -> Result<Vec<Share>, ShamirError> {
    SchemeParams { threshold, total }.validate()?;
    if secret.is_empty() {
        return Err(ShamirError::InvalidShare("Empty secret".into()));
    }

    let mut rng = OsRng;
    let identifier = (rng.next_u32() as u16) & IDENTIFIER_MASK;
    let mut shares: Vec<Share> = (1..=total)
        .map(|index| Share {
            index,
            threshold,
            identifier,
            data: Vec::with_capacity(secret.len()),
        })
        .collect();

    // p(x) = secret_byte + c1*x + ... + c_{t-1}*x^{t-1}
    let mut coefficients = Zeroizing::new(vec![0u8; threshold as usize]);
    for &secret_byte in secret {
        coefficients[0] = secret_byte;
        rng.fill_bytes(&mut coefficients[1..]);

        for share in &mut shares {
            share.data.push(poly_eval(&coefficients, share.index));
        }
    }

    Ok(shares)
}

/// Reconstruct a secret from at least `threshold` shares.
///
/// Exactly the first `threshold` shares are interpolated; any extra shares
/// are ignored.
pub fn combine_shares(shares: &[Share]) -> Result<Zeroizing<Vec<u8>>, ShamirError> {
    let first = shares.first().ok_or(ShamirError::InsufficientShares {
        have: 0,
        need: 2,
    })?;
    let threshold = first.threshold;
    let secret_len = first.data.len();

    if threshold < 2 {
        return Err(ShamirError::InvalidThreshold);
    }
    if shares
        .iter()
        .any(|s| s.threshold != threshold || s.identifier != first.identifier)
    {
        return Err(ShamirError::InvalidShare(
            "Shares come from different splits".into(),
        ));
    }
    if shares.len() < threshold as usize {
        return Err(ShamirError::InsufficientShares {
            have: shares.len(),
            need: threshold as usize,
        });
    }
    if shares.iter().any(|s| s.data.len() != secret_len) {
        return Err(ShamirError::InvalidShare(
            "Shares have different lengths".into(),
        ));
    }
    if shares.iter().any(|s| s.index == 0) {
        return Err(ShamirError::InvalidShare("Share index 0".into()));
    }

    let used = &shares[..threshold as usize];
    let mut indices: Vec<u8> = used.iter().map(|s| s.index).collect();
    indices.sort_unstable();
    indices.dedup();
    if indices.len() != used.len() {
        return Err(ShamirError::InvalidShare("Duplicate share indices".into()));
    }

    let mut secret = Zeroizing::new(Vec::with_capacity(secret_len));
    let mut points: Vec<(u8, u8)> = Vec::with_capacity(used.len());
    for byte_idx in 0..secret_len {
        points.clear();
        points.extend(used.iter().map(|s| (s.index, s.data[byte_idx])));
        secret.push(lagrange_interpolate(&points));
    }
    points.zeroize();

    Ok(secret)
}
