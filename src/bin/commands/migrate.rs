use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use stratum::{OutputFormat, Reconciliation, StratumConfig};

use super::print_json;

/// Arguments for the Migrate command
#[derive(Args)]
pub struct MigrateArgs {
    /// Migration directory, overriding the configured one
    #[clap(short, long)]
    pub migrate_dir: Option<PathBuf>,

    /// Disable migrations: an outdated database is rebuilt empty
    #[clap(long, conflicts_with = "migrate_dir")]
    pub no_migrations: bool,
}

#[derive(Debug, Serialize)]
struct MigrateResult {
    path: String,
    version: u32,
    reconciliation: Reconciliation,
}

pub fn run(config: &StratumConfig, args: MigrateArgs, output_format: OutputFormat) -> Result<()> {
    let MigrateArgs {
        migrate_dir,
        no_migrations,
    } = args;

    let mut options = config.database_options();
    if no_migrations {
        options = options.migrate_dir(None);
    } else if let Some(dir) = migrate_dir.as_deref() {
        options = options.migrate_dir(Some(dir));
    }

    let mut db = options.open()?;
    let result = MigrateResult {
        path: db.path().display().to_string(),
        version: db.get_version()?,
        reconciliation: db.reconciliation().clone(),
    };
    db.close()?;

    if !print_json(&result, output_format) {
        println!("{}: {}", result.path, result.reconciliation);
    }
    Ok(())
}
