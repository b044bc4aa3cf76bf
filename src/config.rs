use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::database::{
    ensure_data_dir, DatabaseConn, DatabaseOptions, SchemaRegistry, SchemaStatus, TracingLog,
    VersionStore, DEFAULT_DB_NAME, ENTITIES, FIELDS, SCHEMA_VERSION,
};

pub struct StratumConfig {
    /// Path to the directory holding the database file
    pub data_dir: String,

    /// Database file name inside `data_dir`
    pub db_name: String,

    /// Directory with migration step scripts; unset disables migrations
    pub migrate_dir: Option<String>,

    /// How long SQLite retries a locked database, in milliseconds (default: 5000)
    pub busy_timeout_ms: u64,
}

const EMPTY_CONFIG: &str = r#"### stratum configuration file

### directory holding the database file
# data_dir = "~/.stratum"

### database file name
# db_name = "stratum.db"

### directory with <from>_<to>_<description>.sql migration steps
### without it, outdated databases are rebuilt empty
# migrate_dir = "/usr/share/stratum/migrations"

### lock wait in milliseconds
# busy_timeout_ms = 5000
"#;

impl Default for StratumConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.stratum", home_dir),
            db_name: DEFAULT_DB_NAME.to_string(),
            migrate_dir: None,
            busy_timeout_ms: 5000,
        }
    }
}

impl StratumConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<StratumConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.stratum/stratum.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let stratum_dir = format!("{}/.stratum", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(stratum_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create stratum directory: {}", e))?;
                let p = format!("{}/stratum.toml", stratum_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of STRATUM)
        // E.g., `STRATUM_MIGRATE_DIR=./migrations stratum migrate`
        builder = builder.add_source(config::Environment::with_prefix("STRATUM"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config, &stratum_dir)
    }

    fn from_map(config: &HashMap<String, String>, default_dir: &str) -> Result<StratumConfig> {
        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => default_dir.to_string(),
        };
        ensure_data_dir(&data_dir)?;

        let db_name = config
            .get("db_name")
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_DB_NAME.to_string());

        let migrate_dir = config
            .get("migrate_dir")
            .filter(|s| !s.trim().is_empty())
            .map(|s| expand_home(s));

        let busy_timeout_ms = match config.get("busy_timeout_ms") {
            Some(s) => s
                .parse()
                .map_err(|e| anyhow!("Invalid busy_timeout_ms '{}': {}", s, e))?,
            None => 5000,
        };

        Ok(StratumConfig {
            data_dir,
            db_name,
            migrate_dir,
            busy_timeout_ms,
        })
    }

    /// Get the path to the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        Path::new(self.data_dir.trim_end_matches('/')).join(&self.db_name)
    }

    /// Get the migration directory, if configured
    pub fn migrate_path(&self) -> Option<PathBuf> {
        self.migrate_dir.as_ref().map(PathBuf::from)
    }

    /// Get the busy timeout as Duration
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Options for opening the application database with this configuration
    pub fn database_options(&self) -> DatabaseOptions<'static> {
        let migrate_dir = self.migrate_path();
        DatabaseOptions::new(ENTITIES, FIELDS, &self.data_dir)
            .db_name(self.db_name.as_str())
            .migrate_dir(migrate_dir.as_deref())
            .busy_timeout(self.busy_timeout())
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("Database Path:      {}", self.database_path().display()),
            format!(
                "Migration Dir:      {}",
                self.migrate_dir.as_deref().unwrap_or("(disabled)")
            ),
            format!("Busy Timeout:       {} ms", self.busy_timeout_ms),
            format!("Schema Version:     {}", SCHEMA_VERSION),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.stratum/stratum.toml", home_dir)
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => path.to_string(),
    }
}

/// Information about the SQLite database, read without reconciling it
#[derive(Debug, Serialize, Clone)]
pub struct DatabaseInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    pub target_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SchemaStatus>,
    pub missing_entities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Get SQLite database information
///
/// The file is opened read-only: it is never created, reconciled or switched
/// to another journal mode.
pub fn get_database_info(config: &StratumConfig) -> DatabaseInfo {
    let path = config.database_path();
    let exists = path.exists();
    let size_bytes = if exists {
        std::fs::metadata(&path).ok().map(|m| m.len())
    } else {
        None
    };

    let mut info = DatabaseInfo {
        path: path.display().to_string(),
        exists,
        size_bytes,
        schema_version: None,
        target_version: SCHEMA_VERSION,
        status: None,
        missing_entities: Vec::new(),
        error: None,
    };

    if !exists {
        info.status = Some(SchemaStatus::NotInitialized);
        return info;
    }

    let read = || -> anyhow::Result<(u32, Vec<String>)> {
        let db = DatabaseConn::open_read_only(&path, config.busy_timeout())?;
        let version = VersionStore::new(&db.conn).read()?;
        let log = TracingLog;
        let missing = SchemaRegistry::new(ENTITIES, FIELDS, &log)
            .missing_entities(&db.conn)?
            .into_iter()
            .map(String::from)
            .collect();
        Ok((version, missing))
    };

    match read() {
        Ok((version, missing)) => {
            info.schema_version = Some(version);
            info.status = Some(SchemaStatus::classify(version, SCHEMA_VERSION));
            info.missing_entities = missing;
        }
        Err(e) => info.error = Some(e.to_string()),
    }

    info
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
