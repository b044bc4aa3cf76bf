use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use stratum::{DatabaseConn, OutputFormat, StratumConfig, VersionStore, SCHEMA_VERSION};

use super::print_json;

/// Arguments for the Version command
#[derive(Args)]
pub struct VersionArgs {
    #[clap(subcommand)]
    pub command: Option<VersionCommands>,
}

#[derive(Subcommand)]
pub enum VersionCommands {
    /// Print the stored schema version (default)
    Get,

    /// Overwrite the stored schema version without touching any table
    Set {
        /// New schema version
        version: u32,
    },
}

#[derive(Debug, Serialize)]
struct VersionInfo {
    path: String,
    stored_version: u32,
    target_version: u32,
}

pub fn run(config: &StratumConfig, args: VersionArgs, output_format: OutputFormat) -> Result<()> {
    let path = config.database_path();
    if !path.exists() {
        return Err(anyhow!("database '{}' does not exist", path.display()));
    }

    let set = match args.command {
        Some(VersionCommands::Set { version }) => Some(version),
        _ => None,
    };

    let db = match set {
        Some(_) => DatabaseConn::open(Some(path.as_path()), config.busy_timeout())?,
        None => DatabaseConn::open_read_only(&path, config.busy_timeout())?,
    };
    let store = VersionStore::new(&db.conn);

    if let Some(version) = set {
        store.write(version)?;
    }

    let info = VersionInfo {
        path: path.display().to_string(),
        stored_version: store.read()?,
        target_version: SCHEMA_VERSION,
    };
    db.close()?;

    if !print_json(&info, output_format) {
        println!(
            "stored version: {} (target {})",
            info.stored_version, info.target_version
        );
    }
    Ok(())
}
