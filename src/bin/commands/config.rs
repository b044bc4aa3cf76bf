use anyhow::Result;
use serde::Serialize;
use stratum::{OutputFormat, StratumConfig, SCHEMA_VERSION};

use super::print_json;

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    database_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    migrate_dir: Option<String>,
    busy_timeout_ms: u64,
    schema_version: u32,
}

pub fn run(config: &StratumConfig, output_format: OutputFormat) -> Result<()> {
    let info = ConfigInfo {
        config_file: StratumConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        database_path: config.database_path().display().to_string(),
        migrate_dir: config.migrate_dir.clone(),
        busy_timeout_ms: config.busy_timeout_ms,
        schema_version: SCHEMA_VERSION,
    };

    if !print_json(&info, output_format) {
        println!("Config File:        {}", info.config_file);
        println!("{}", config.summary());
    }
    Ok(())
}
