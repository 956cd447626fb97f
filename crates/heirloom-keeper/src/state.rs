//! Persistent keeper state: the vault ledger and the alert log.
//!
//! Both are pretty JSON files in the data directory. Loading a missing file
//! yields a fresh value; saving writes a sibling temp file and renames it
//! over the target.

use crate::config::KeeperConfig;
use anyhow::{Context, Result};
use heirloom_vault::{VaultId, VaultLedger, DAY};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(value).context("Failed to serialize state")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

// ============================================================================
// Ledger
// ============================================================================

/// Load the ledger from the data directory, or bootstrap an empty one from
/// the `[ledger]` section if none exists yet.
pub fn load_ledger(config: &KeeperConfig) -> Result<VaultLedger> {
    let path = config.ledger_path();
    match read_json::<VaultLedger>(&path)? {
        Some(ledger) => {
            ledger
                .validate()
                .with_context(|| format!("Ledger at {} is inconsistent", path.display()))?;
            warn_on_drift(config, &ledger)?;
            log::debug!("Loaded {} vaults from {}", ledger.len(), path.display());
            Ok(ledger)
        }
        None => {
            log::info!("No ledger at {}; starting a new one", path.display());
            VaultLedger::with_trusted_oracle(
                config.admin()?,
                config.oracle()?,
                config.death_verification_delay_secs(),
            )
            .context("Failed to create ledger")
        }
    }
}

/// The persisted ledger is authoritative; config only seeds a new one.
fn warn_on_drift(config: &KeeperConfig, ledger: &VaultLedger) -> Result<()> {
    if ledger.admin() != config.admin()? {
        log::warn!(
            "Ledger admin {} differs from configured {}",
            ledger.admin(),
            config.ledger.admin
        );
    }
    if ledger.oracle().address() != config.oracle()? {
        log::warn!(
            "Ledger oracle {} differs from configured {}",
            ledger.oracle().address(),
            config.ledger.oracle
        );
    }
    if ledger.death_verification_delay() != config.death_verification_delay_secs() {
        log::warn!(
            "Ledger verification delay {}s differs from configured {}s",
            ledger.death_verification_delay(),
            config.death_verification_delay_secs()
        );
    }
    Ok(())
}

pub fn save_ledger(config: &KeeperConfig, ledger: &VaultLedger) -> Result<()> {
    write_json(&config.ledger_path(), ledger)
}

// ============================================================================
// Alert log
// ============================================================================

/// Which reminder level each vault last received, so a reminder fires once
/// per level rather than on every sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertLog {
    sent: BTreeMap<VaultId, u64>,
}

impl AlertLog {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    /// Decide whether `vault_id`, `until_trigger` seconds from its trigger,
    /// is due a reminder. Returns the threshold (in days) to report.
    ///
    /// A vault back outside every threshold (after a check-in) is cleared
    /// so the next approach alerts again.
    pub fn due(&mut self, vault_id: VaultId, until_trigger: u64, warn_before_days: &[u64]) -> Option<u64> {
        let level = warn_before_days
            .iter()
            .copied()
            .filter(|&d| until_trigger <= d.saturating_mul(DAY))
            .min();
        let Some(level) = level else {
            self.sent.remove(&vault_id);
            return None;
        };
        match self.sent.get(&vault_id) {
            Some(&prev) if prev <= level => None,
            _ => {
                self.sent.insert(vault_id, level);
                Some(level)
            }
        }
    }

    /// Forget vaults that no longer need reminders.
    pub fn forget(&mut self, vault_id: VaultId) {
        self.sent.remove(&vault_id);
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}
