//! Database module
//!
//! This module provides the versioned store and everything needed to bring a
//! database file to the schema version the application expects:
//!
//! - **core**: SQLite connection, version cell, entity descriptors and registry
//! - **migration**: migration directory index and step runner
//! - **engine**: open-time reconciliation (create, migrate or rebuild)
//! - **entities**: the application's own entity set at `SCHEMA_VERSION`
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   ├── schema      # Entity descriptors and SchemaRegistry
//! │   └── version     # PRAGMA user_version cell
//! │
//! ├── migration/      # Incremental upgrades
//! │   ├── registry    # <from>_<to>_*.sql step discovery
//! │   └── runner      # Chain execution
//! │
//! ├── engine          # Database / DatabaseOptions
//! ├── entities        # Application tables
//! ├── error           # StoreError
//! └── log             # MigrationLog collaborator
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use stratum::database::{Database, ENTITIES, FIELDS};
//!
//! let mut db = Database::open(ENTITIES, FIELDS, "/var/lib/node", "stratum.db", Some(migrations))?;
//! println!("{}", db.reconciliation());
//! let conn = db.connection()?;
//! // ... application queries ...
//! db.close()?;
//! ```

pub mod core;
pub mod engine;
pub mod entities;
pub mod error;
pub mod log;
pub mod migration;

pub use core::{
    Column, ColumnKind, DatabaseConn, Entity, Field, Index, SchemaRegistry, SchemaStatus,
    VersionStore, DEFAULT_BUSY_TIMEOUT, MAX_VERSION, UNSET_VERSION,
};
pub use engine::{Database, DatabaseOptions, Reconciliation, DEFAULT_DB_NAME};
pub use entities::{ENTITIES, FIELDS, SCHEMA_VERSION};
pub use error::{StoreError, StoreResult};
pub use log::{MigrationLog, TracingLog};
pub use migration::{
    MigrationError, MigrationRegistry, MigrationRunner, MigrationStep, StepInfo,
};

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}
