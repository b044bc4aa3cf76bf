use anyhow::{anyhow, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use stratum::{
    DatabaseConn, MigrationRegistry, OutputFormat, StepInfo, StratumConfig, VersionStore,
    SCHEMA_VERSION,
};
use tabled::settings::Style;
use tabled::Table;

use super::print_json;

/// Arguments for the Steps command
#[derive(Args)]
pub struct StepsArgs {
    /// Migration directory, overriding the configured one
    #[clap(short, long)]
    pub migrate_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct StepsReport {
    directory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stored_version: Option<u32>,
    target_version: u32,
    steps: Vec<StepInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chain_error: Option<String>,
}

pub fn run(config: &StratumConfig, args: StepsArgs, output_format: OutputFormat) -> Result<()> {
    let dir = args
        .migrate_dir
        .or_else(|| config.migrate_path())
        .ok_or_else(|| anyhow!("no migration directory configured"))?;

    let registry = MigrationRegistry::scan(&dir)?;
    let stored_version = read_stored_version(config)?;

    let (steps, chain_error) = match stored_version {
        Some(v) if v > 0 && v < SCHEMA_VERSION => match registry.plan(v, SCHEMA_VERSION) {
            Ok(steps) => (steps, None),
            Err(e) => (registry.list(), Some(e.to_string())),
        },
        _ => (registry.list(), None),
    };

    let report = StepsReport {
        directory: dir.display().to_string(),
        stored_version,
        target_version: SCHEMA_VERSION,
        steps,
        chain_error,
    };

    if !print_json(&report, output_format) {
        println!("Migration directory: {}", report.directory);
        if report.steps.is_empty() {
            println!("No migration steps found.");
        } else {
            println!("{}", Table::new(&report.steps).with(Style::rounded()));
        }
        if let Some(e) = &report.chain_error {
            println!(
                "Database cannot be migrated ({}); it will be rebuilt on next open.",
                e
            );
        }
    }
    Ok(())
}

fn read_stored_version(config: &StratumConfig) -> Result<Option<u32>> {
    let path = config.database_path();
    if !path.exists() {
        return Ok(None);
    }
    let db = DatabaseConn::open_read_only(&path, config.busy_timeout())?;
    let version = VersionStore::new(&db.conn).read()?;
    db.close()?;
    Ok(Some(version))
}
