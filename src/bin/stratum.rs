use std::process::exit;

use clap::{Parser, Subcommand};
use stratum::*;
use tracing::Level;

mod commands;

use commands::migrate::MigrateArgs;
use commands::steps::StepsArgs;
use commands::version::VersionArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.stratum/stratum.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output format: table, json, json-pretty
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the database schema state without changing anything.
    Status,

    /// Open the database and bring its schema to the current version.
    Migrate(MigrateArgs),

    /// Read or overwrite the stored schema version.
    Version(VersionArgs),

    /// List migration steps and the chain needed by the database.
    Steps(StepsArgs),

    /// Show the effective configuration.
    Config,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let config = match StratumConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            exit(1);
        }
    };

    let result = match cli.command {
        Commands::Status => commands::status::run(&config, cli.format),
        Commands::Migrate(args) => commands::migrate::run(&config, args, cli.format),
        Commands::Version(args) => commands::version::run(&config, args, cli.format),
        Commands::Steps(args) => commands::steps::run(&config, args, cli.format),
        Commands::Config => commands::config::run(&config, cli.format),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        exit(1);
    }
}
