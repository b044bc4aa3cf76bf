use anyhow::Result;
use stratum::{format_size, get_database_info, DatabaseInfo, OutputFormat, StratumConfig};

use super::print_json;

pub fn run(config: &StratumConfig, output_format: OutputFormat) -> Result<()> {
    let info = get_database_info(config);

    if !print_json(&info, output_format) {
        print_status(&info, config);
    }
    Ok(())
}

fn print_status(info: &DatabaseInfo, config: &StratumConfig) {
    println!("Stratum Database Status");
    println!("=======================\n");

    println!("  Path:           {}", info.path);
    println!(
        "  File:           {}",
        if info.exists { "exists" } else { "not created" }
    );
    if let Some(size) = info.size_bytes {
        println!("  Size:           {}", format_size(size));
    }
    match info.schema_version {
        Some(v) => println!("  Stored version: {}", v),
        None => println!("  Stored version: -"),
    }
    println!("  Target version: {}", info.target_version);
    if let Some(status) = &info.status {
        println!("  Schema:         {}", status);
    }
    if !info.missing_entities.is_empty() {
        println!("  Missing tables: {}", info.missing_entities.join(", "));
    }
    println!(
        "  Migrations:     {}",
        config.migrate_dir.as_deref().unwrap_or("disabled")
    );
    if let Some(error) = &info.error {
        println!("\n  Error: {}", error);
    }
}
