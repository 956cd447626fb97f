//! Keeper configuration — parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use heirloom_core::Address;
use heirloom_vault::{DAY, MAX_DEATH_VERIFICATION_DELAY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level keeper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// General keeper settings
    #[serde(default)]
    pub keeper: KeeperSection,

    /// Ledger bootstrap settings
    pub ledger: LedgerSection,

    /// Deadline reminders
    #[serde(default)]
    pub alerts: AlertSection,
}

/// General keeper settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperSection {
    /// Data directory (ledger.json, alerts.json, fragments/)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Sweep interval in seconds (default: 1 hour)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for KeeperSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sweep_interval_secs: default_sweep_interval(),
            log_level: default_log_level(),
        }
    }
}

/// Used only when no ledger exists yet in the data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Admin address (0x + 40 hex)
    pub admin: String,

    /// Trusted oracle address
    pub oracle: String,

    /// Days between death verification and ReadyForClaim
    #[serde(default = "default_verification_delay")]
    pub death_verification_delay_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSection {
    /// Log a reminder when a vault's trigger is this many days away
    #[serde(default = "default_warn_before_days")]
    pub warn_before_days: Vec<u64>,
}

impl Default for AlertSection {
    fn default() -> Self {
        Self {
            warn_before_days: default_warn_before_days(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_verification_delay() -> u64 {
    3
}

fn default_warn_before_days() -> Vec<u64> {
    vec![14, 7, 1]
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl KeeperConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: KeeperConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `HEIRLOOM_DATA_DIR`
    /// - `HEIRLOOM_SWEEP_INTERVAL`
    /// - `HEIRLOOM_LOG_LEVEL`
    /// - `HEIRLOOM_ADMIN`
    /// - `HEIRLOOM_ORACLE`
    /// - `HEIRLOOM_VERIFICATION_DELAY_DAYS`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("HEIRLOOM_DATA_DIR") {
            self.keeper.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("HEIRLOOM_SWEEP_INTERVAL") {
            if let Ok(secs) = v.parse::<u64>() {
                self.keeper.sweep_interval_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("HEIRLOOM_LOG_LEVEL") {
            self.keeper.log_level = v;
        }
        if let Ok(v) = std::env::var("HEIRLOOM_ADMIN") {
            self.ledger.admin = v;
        }
        if let Ok(v) = std::env::var("HEIRLOOM_ORACLE") {
            self.ledger.oracle = v;
        }
        if let Ok(v) = std::env::var("HEIRLOOM_VERIFICATION_DELAY_DAYS") {
            if let Ok(days) = v.parse::<u64>() {
                self.ledger.death_verification_delay_days = days;
            }
        }
    }

    pub fn admin(&self) -> Result<Address> {
        self.ledger
            .admin
            .parse()
            .with_context(|| format!("ledger.admin is not an address: {}", self.ledger.admin))
    }

    pub fn oracle(&self) -> Result<Address> {
        self.ledger
            .oracle
            .parse()
            .with_context(|| format!("ledger.oracle is not an address: {}", self.ledger.oracle))
    }

    pub fn death_verification_delay_secs(&self) -> u64 {
        self.ledger.death_verification_delay_days.saturating_mul(DAY)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.keeper.data_dir.join("ledger.json")
    }

    pub fn alerts_path(&self) -> PathBuf {
        self.keeper.data_dir.join("alerts.json")
    }

    pub fn fragments_dir(&self) -> PathBuf {
        self.keeper.data_dir.join("fragments")
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.keeper.sweep_interval_secs >= 60,
            "keeper.sweep_interval_secs must be >= 60"
        );

        let admin = self.admin()?;
        anyhow::ensure!(!admin.is_zero(), "ledger.admin must not be the zero address");
        let oracle = self.oracle()?;
        anyhow::ensure!(!oracle.is_zero(), "ledger.oracle must not be the zero address");

        anyhow::ensure!(
            self.death_verification_delay_secs() <= MAX_DEATH_VERIFICATION_DELAY,
            "ledger.death_verification_delay_days must be <= 90"
        );

        anyhow::ensure!(
            self.alerts.warn_before_days.iter().all(|&d| d > 0),
            "alerts.warn_before_days entries must be > 0"
        );

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
