//! Heirloom Keeper — the external sweeper for the vault ledger
//!
//! Vault status is computed lazily and only persisted by mutating calls.
//! The keeper loads the ledger on a fixed interval, persists every
//! pending transition, and logs reminders as trigger deadlines approach.
//!
//! # Usage
//!
//! ```bash
//! heirloom-keeper --config /path/to/heirloom-keeper.toml
//! heirloom-keeper --once      # Run one sweep and exit
//! heirloom-keeper --status    # Print every vault and exit
//! heirloom-keeper --validate  # Validate config and exit
//! ```

mod config;
mod daemon;
mod state;

use anyhow::{Context, Result};
use std::path::PathBuf;

fn main() -> Result<()> {
    // Parse CLI args (minimal — no clap dependency needed)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("/config/heirloom-keeper.toml");
    let mut one_shot = false;
    let mut validate_only = false;
    let mut status_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--once" => {
                one_shot = true;
            }
            "--validate" => {
                validate_only = true;
            }
            "--status" => {
                status_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("heirloom-keeper {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    // Load config
    let mut keeper_config = config::KeeperConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Apply env overrides
    keeper_config.apply_env_overrides();

    // Validate
    keeper_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &keeper_config.keeper.log_level);
    env_logger::init();

    if validate_only {
        println!("✅ Configuration is valid.");
        println!("  Data dir:       {}", keeper_config.keeper.data_dir.display());
        println!(
            "  Sweep interval: {} secs",
            keeper_config.keeper.sweep_interval_secs
        );
        println!("  Admin:          {}", keeper_config.ledger.admin);
        println!("  Oracle:         {}", keeper_config.ledger.oracle);
        println!(
            "  Verify delay:   {} days",
            keeper_config.ledger.death_verification_delay_days
        );
        println!(
            "  Reminders:      {:?} days",
            keeper_config.alerts.warn_before_days
        );
        return Ok(());
    }

    if status_only {
        print!("{}", daemon::status_table(&keeper_config, daemon::unix_now())?);
        return Ok(());
    }

    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    if one_shot {
        log::info!("Running single sweep…");
        let report = daemon::run_sweep(&keeper_config, daemon::unix_now())?;
        log::info!(
            "Done: {} transitions, {} reminders.",
            report.changes.len(),
            report.alerts.len()
        );
    } else {
        // Install Ctrl-C handler for graceful shutdown
        let shutdown = rt.block_on(async {
            tokio::select! {
                result = daemon::run(keeper_config) => result,
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received shutdown signal. Exiting…");
                    Ok(())
                }
            }
        });

        if let Err(e) = shutdown {
            log::error!("Keeper error: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"Heirloom Keeper — periodic vault status sweeper

USAGE:
    heirloom-keeper [OPTIONS]

OPTIONS:
    -c, --config <PATH>   Config file path (default: /config/heirloom-keeper.toml)
    --once                Run a single sweep and exit
    --status              Print every vault's status and deadlines, then exit
    --validate            Validate config file and exit
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    HEIRLOOM_DATA_DIR                 Data directory path
    HEIRLOOM_SWEEP_INTERVAL           Sweep interval in seconds
    HEIRLOOM_LOG_LEVEL                Log level (error/warn/info/debug/trace)
    HEIRLOOM_ADMIN                    Admin address for a new ledger
    HEIRLOOM_ORACLE                   Oracle address for a new ledger
    HEIRLOOM_VERIFICATION_DELAY_DAYS  Death verification delay for a new ledger

EXAMPLES:
    # Run as daemon with config file
    heirloom-keeper --config /path/to/config.toml

    # Single sweep (useful for cron jobs)
    heirloom-keeper --config config.toml --once

    # Inspect vaults
    heirloom-keeper --config config.toml --status
"#
    );
}
