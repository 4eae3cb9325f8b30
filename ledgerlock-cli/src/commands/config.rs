//! Config command - inspect or create settings.json

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use ledgerlock_core::config::{Config, SETTINGS_FILE};

use super::{get_context, get_ledgerlock_dir};
use crate::output::{create_table, info, success, warning};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a settings file with default values
    Init {
        /// Overwrite an existing settings file
        #[arg(long, short)]
        force: bool,
    },
}

pub fn run(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show { json } => show(json),
        ConfigCommands::Init { force } => init(force),
    }
}

fn show(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let config = &ctx.config;

    if json {
        println!("{}", serde_json::to_string_pretty(&config.to_json())?);
        return Ok(());
    }

    println!("{}", "Ledgerlock Settings".bold());
    println!();

    let mut table = create_table();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["Max attempts".to_string(), config.max_attempts.to_string()]);
    table.add_row(vec![
        "First lock timeout".to_string(),
        format!("{} ms", config.first_lock_timeout.as_millis()),
    ]);
    table.add_row(vec![
        "Second lock timeout".to_string(),
        format!("{} ms", config.second_lock_timeout.as_millis()),
    ]);
    table.add_row(vec![
        "Backoff".to_string(),
        format!(
            "{} ({}-{} ms)",
            config.backoff,
            config.backoff_min.as_millis(),
            config.backoff_max.as_millis()
        ),
    ]);
    table.add_row(vec![
        "Naive lock timeout".to_string(),
        format!("{} ms", config.naive_lock_timeout.as_millis()),
    ]);
    table.add_row(vec![
        "Processing delay".to_string(),
        format!("{} ms", config.processing_delay.as_millis()),
    ]);
    table.add_row(vec!["Workers".to_string(), config.workers.to_string()]);
    println!("{}", table);

    let path = get_ledgerlock_dir()?.join(SETTINGS_FILE);
    if path.exists() {
        info(&format!("Loaded from {}", path.display()));
    } else {
        info("No settings file, using defaults");
    }
    Ok(())
}

fn init(force: bool) -> Result<()> {
    let dir = get_ledgerlock_dir()?;
    let path = dir.join(SETTINGS_FILE);

    if path.exists() && !force {
        warning(&format!(
            "{} already exists, use --force to overwrite",
            path.display()
        ));
        return Ok(());
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create ledgerlock directory: {:?}", dir))?;
    Config::default().save(&dir)?;
    success(&format!("Wrote {}", path.display()));
    Ok(())
}
