//! The keeper loop — periodically recomputes every vault's status and logs
//! transitions and upcoming deadlines.

use crate::config::KeeperConfig;
use crate::state::{self, AlertLog};
use anyhow::{Context, Result};
use heirloom_shamir::{FileFragmentStore, FragmentStore};
use heirloom_vault::{StatusChange, VaultId, VaultStatus, DAY};
use std::time::Duration;

/// What one sweep did.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Transitions persisted by this sweep
    pub changes: Vec<StatusChange>,
    /// Reminders logged: (vault, threshold in days)
    pub alerts: Vec<(VaultId, u64)>,
}

/// Run the keeper loop. Blocks forever (until shutdown signal).
pub async fn run(config: KeeperConfig) -> Result<()> {
    log::info!("Heirloom keeper starting…");
    log::info!(
        "  Interval:   {} seconds ({:.1} hours)",
        config.keeper.sweep_interval_secs,
        config.keeper.sweep_interval_secs as f64 / 3600.0
    );
    log::info!("  Data dir:   {}", config.keeper.data_dir.display());
    log::info!("  Reminders:  {:?} days", config.alerts.warn_before_days);

    std::fs::create_dir_all(&config.keeper.data_dir).with_context(|| {
        format!(
            "Failed to create data dir: {}",
            config.keeper.data_dir.display()
        )
    })?;

    let interval = Duration::from_secs(config.keeper.sweep_interval_secs);

    // Sweep immediately, then on every tick
    let mut first = true;
    loop {
        if !first {
            log::debug!(
                "Sleeping {} seconds until next sweep…",
                config.keeper.sweep_interval_secs
            );
            tokio::time::sleep(interval).await;
        }
        first = false;

        match run_sweep(&config, unix_now()) {
            Ok(report) => log::info!(
                "Sweep completed: {} transitions, {} reminders.",
                report.changes.len(),
                report.alerts.len()
            ),
            Err(e) => log::error!("Sweep failed: {:#}", e),
        }
    }
}

/// One sweep: load, persist pending transitions, log reminders, save.
pub fn run_sweep(config: &KeeperConfig, now: u64) -> Result<SweepReport> {
    let mut ledger = state::load_ledger(config)?;
    let mut report = SweepReport {
        changes: ledger.update_all(now),
        ..SweepReport::default()
    };

    for change in &report.changes {
        match change.to {
            VaultStatus::Triggered => {
                let closes = ledger
                    .vault(change.vault_id)
                    .ok()
                    .and_then(|v| v.revoke_deadline());
                log::warn!(
                    "{} (revoke window closes {})",
                    change,
                    closes.map(fmt_time).unwrap_or_else(|| "-".into())
                );
            }
            _ => log::info!("{}", change),
        }
    }
    for event in ledger.take_events() {
        log::debug!("event: {:?}", event);
    }

    let alerts_path = config.alerts_path();
    let mut alerts = AlertLog::load(&alerts_path)?;
    for vault in ledger.vaults() {
        if !vault.status.is_live() {
            alerts.forget(vault.id);
            continue;
        }
        let deadlines = vault.deadlines(now);
        if let Some(days) = alerts.due(vault.id, deadlines.until_trigger, &config.alerts.warn_before_days) {
            log::warn!(
                "Vault {} triggers within {} day(s) at {} unless {} checks in",
                vault.id,
                days,
                fmt_time(deadlines.trigger_at),
                vault.owner
            );
            report.alerts.push((vault.id, days));
        }
    }

    // A bootstrapped ledger is written once so later sweeps load it
    if !report.changes.is_empty() || !config.ledger_path().exists() {
        state::save_ledger(config, &ledger)?;
    }
    alerts.save(&alerts_path)?;
    log::debug!("{} vaults tracked for reminders", alerts.len());
    Ok(report)
}

/// Render every vault's status at `now` as a table.
pub fn status_table(config: &KeeperConfig, now: u64) -> Result<String> {
    let ledger = state::load_ledger(config)?;
    let fragments = if config.fragments_dir().exists() {
        Some(FileFragmentStore::open(config.fragments_dir()).context("Failed to open fragment store")?)
    } else {
        None
    };

    let mut out = format!(
        "{:<6} {:<44} {:<14} {:<22} {:<6} {:<9}\n",
        "VAULT", "OWNER", "STATUS", "TRIGGER", "ATTEST", "FRAGMENTS"
    );
    for vault in ledger.vaults() {
        let status = ledger.status(vault.id, now)?;
        let trigger = if status.is_live() {
            let d = vault.deadlines(now);
            format!("{} ({}d)", fmt_date(d.trigger_at), d.until_trigger / DAY)
        } else {
            "-".into()
        };
        let stored = match &fragments {
            Some(store) => store
                .load(vault.id.0)
                .with_context(|| format!("Failed to read fragments of vault {}", vault.id))?
                .map(|f| f.len().to_string())
                .unwrap_or_else(|| "-".into()),
            None => "-".into(),
        };
        out.push_str(&format!(
            "{:<6} {:<44} {:<14} {:<22} {:<6} {:<9}\n",
            vault.id.to_string(),
            vault.owner.to_string(),
            status.to_string(),
            trigger,
            format!(
                "{}/{}",
                vault.attestations.count(),
                vault.attestations.threshold()
            ),
            stored
        ));
    }
    Ok(out)
}

pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

fn fmt_time(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn fmt_date(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.to_string())
}
