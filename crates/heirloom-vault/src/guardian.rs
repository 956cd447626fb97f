//! Guardian registry
//!
//! A vault has exactly three address guardians, fixed at creation, and up to
//! two email guardians added later. An email guardian is known only by the
//! hash of their email until they prove control of an address with a
//! signature over `(vault id, email hash)`. The first valid signature links
//! that address permanently.
//!
//! Guardians are never removed.

use crate::error::VaultError;
use crate::types::{ADDRESS_GUARDIANS, MAX_GUARDIANS};
use heirloom_core::{Address, EmailHash, IdentityError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Uniform key for attestation bookkeeping across both guardian kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GuardianId {
    Address(Address),
    Email(EmailHash),
}

impl fmt::Display for GuardianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardianId::Address(a) => write!(f, "address:{}", a),
            GuardianId::Email(h) => write!(f, "email:{}", h),
        }
    }
}

impl FromStr for GuardianId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("address:") {
            Ok(GuardianId::Address(rest.parse()?))
        } else if let Some(rest) = s.strip_prefix("email:") {
            Ok(GuardianId::Email(rest.parse()?))
        } else {
            Err(IdentityError::InvalidAddress(format!(
                "unknown guardian id form: {}",
                s
            )))
        }
    }
}

// String form so guardian ids can key JSON maps
impl Serialize for GuardianId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GuardianId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Guardian {
    Address(Address),
    EmailLinked {
        hash: EmailHash,
        /// Set once, by the first valid signature
        linked: Option<Address>,
    },
}

impl Guardian {
    pub fn id(&self) -> GuardianId {
        match self {
            Guardian::Address(a) => GuardianId::Address(*a),
            Guardian::EmailLinked { hash, .. } => GuardianId::Email(*hash),
        }
    }

    /// The address acting for this guardian, if known.
    pub fn address(&self) -> Option<Address> {
        match self {
            Guardian::Address(a) => Some(*a),
            Guardian::EmailLinked { linked, .. } => *linked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianRegistry {
    guardians: Vec<Guardian>,
}

impl GuardianRegistry {
    /// Build the creation-time set of address guardians.
    ///
    /// `owner` and `beneficiaries` are checked for overlap.
    pub fn new(
        addresses: &[Address],
        owner: Address,
        beneficiaries: &[Address],
    ) -> Result<Self, VaultError> {
        if addresses.len() != ADDRESS_GUARDIANS {
            return Err(VaultError::InvalidGuardianCount(addresses.len()));
        }
        let mut seen = HashSet::new();
        for addr in addresses {
            if addr.is_zero() {
                return Err(VaultError::InvalidParty("guardian is the zero address"));
            }
            if *addr == owner {
                return Err(VaultError::InvalidParty("owner cannot be a guardian"));
            }
            if beneficiaries.contains(addr) {
                return Err(VaultError::GuardianIsBeneficiary(*addr));
            }
            if !seen.insert(*addr) {
                return Err(VaultError::DuplicateGuardian(addr.to_string()));
            }
        }
        Ok(Self {
            guardians: addresses.iter().copied().map(Guardian::Address).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.guardians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guardians.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Guardian> {
        self.guardians.iter()
    }

    /// Whether `addr` is one of the address guardians.
    pub fn is_address_guardian(&self, addr: &Address) -> bool {
        self.guardians
            .iter()
            .any(|g| matches!(g, Guardian::Address(a) if a == addr))
    }

    /// Whether `addr` acts for any guardian, including linked email guardians.
    pub fn acts_for_guardian(&self, addr: &Address) -> bool {
        self.guardians.iter().any(|g| g.address() == Some(*addr))
    }

    /// Linked address of an email guardian (`None` while unlinked).
    pub fn linked_address(&self, hash: &EmailHash) -> Result<Option<Address>, VaultError> {
        self.guardians
            .iter()
            .find_map(|g| match g {
                Guardian::EmailLinked { hash: h, linked } if h == hash => Some(*linked),
                _ => None,
            })
            .ok_or(VaultError::UnknownEmailGuardian)
    }

    pub fn add_email(&mut self, hash: EmailHash) -> Result<(), VaultError> {
        if hash.is_zero() {
            return Err(VaultError::InvalidParty("email hash is zero"));
        }
        if self.guardians.len() >= MAX_GUARDIANS {
            return Err(VaultError::TooManyGuardians);
        }
        if self.linked_address(&hash).is_ok() {
            return Err(VaultError::DuplicateGuardian(hash.to_string()));
        }
        self.guardians.push(Guardian::EmailLinked { hash, linked: None });
        Ok(())
    }

    /// Permanently link `address` to an email guardian.
    pub fn link(
        &mut self,
        hash: &EmailHash,
        address: Address,
        owner: Address,
        beneficiaries: &[Address],
    ) -> Result<(), VaultError> {
        if self.linked_address(hash)?.is_some() {
            return Err(VaultError::EmailAlreadyLinked);
        }
        if address == owner {
            return Err(VaultError::InvalidParty("owner cannot be a guardian"));
        }
        if beneficiaries.contains(&address) {
            return Err(VaultError::GuardianIsBeneficiary(address));
        }
        if self.acts_for_guardian(&address) {
            return Err(VaultError::DuplicateGuardian(address.to_string()));
        }
        for g in &mut self.guardians {
            if let Guardian::EmailLinked { hash: h, linked } = g {
                if h == hash {
                    *linked = Some(address);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn registry() -> GuardianRegistry {
        GuardianRegistry::new(&[addr(1), addr(2), addr(3)], addr(9), &[addr(10)]).unwrap()
    }

    #[test]
    fn test_new_requires_three_unique() {
        assert!(matches!(
            GuardianRegistry::new(&[addr(1), addr(2)], addr(9), &[]),
            Err(VaultError::InvalidGuardianCount(2))
        ));
        assert!(matches!(
            GuardianRegistry::new(&[addr(1), addr(2), addr(1)], addr(9), &[]),
            Err(VaultError::DuplicateGuardian(_))
        ));
        assert!(matches!(
            GuardianRegistry::new(&[addr(1), addr(2), addr(3)], addr(9), &[addr(3)]),
            Err(VaultError::GuardianIsBeneficiary(_))
        ));
        assert!(GuardianRegistry::new(&[addr(1), addr(2), addr(9)], addr(9), &[]).is_err());
        assert!(GuardianRegistry::new(&[addr(1), addr(2), Address::ZERO], addr(9), &[]).is_err());
    }

    #[test]
    fn test_add_email_up_to_five() {
        let mut reg = registry();
        reg.add_email(EmailHash::from_email("a@example.com")).unwrap();
        assert!(matches!(
            reg.add_email(EmailHash::from_email("a@example.com")),
            Err(VaultError::DuplicateGuardian(_))
        ));
        reg.add_email(EmailHash::from_email("b@example.com")).unwrap();
        assert_eq!(reg.len(), 5);
        assert!(matches!(
            reg.add_email(EmailHash::from_email("c@example.com")),
            Err(VaultError::TooManyGuardians)
        ));
    }

    #[test]
    fn test_link_once() {
        let mut reg = registry();
        let hash = EmailHash::from_email("a@example.com");
        reg.add_email(hash).unwrap();
        assert_eq!(reg.linked_address(&hash).unwrap(), None);

        reg.link(&hash, addr(4), addr(9), &[addr(10)]).unwrap();
        assert_eq!(reg.linked_address(&hash).unwrap(), Some(addr(4)));
        assert!(reg.acts_for_guardian(&addr(4)));
        assert!(!reg.is_address_guardian(&addr(4)));

        assert!(matches!(
            reg.link(&hash, addr(5), addr(9), &[addr(10)]),
            Err(VaultError::EmailAlreadyLinked)
        ));
    }

    #[test]
    fn test_link_rejects_existing_parties() {
        let mut reg = registry();
        let hash = EmailHash::from_email("a@example.com");
        reg.add_email(hash).unwrap();
        assert!(matches!(
            reg.link(&hash, addr(10), addr(9), &[addr(10)]),
            Err(VaultError::GuardianIsBeneficiary(_))
        ));
        assert!(matches!(
            reg.link(&hash, addr(1), addr(9), &[addr(10)]),
            Err(VaultError::DuplicateGuardian(_))
        ));
        assert!(matches!(
            reg.link(&EmailHash::from_email("x@example.com"), addr(4), addr(9), &[]),
            Err(VaultError::UnknownEmailGuardian)
        ));
        // Still unlinked after the failures
        assert_eq!(reg.linked_address(&hash).unwrap(), None);
    }

    #[test]
    fn test_guardian_id_string_form() {
        let ids = [
            GuardianId::Address(addr(7)),
            GuardianId::Email(EmailHash::from_email("g@example.com")),
        ];
        for id in ids {
            let s = id.to_string();
            assert_eq!(s.parse::<GuardianId>().unwrap(), id);
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", s));
        }
        assert!("guardian:1234".parse::<GuardianId>().is_err());
    }
}
