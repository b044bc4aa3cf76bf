#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Stratum - versioned schema reconciliation for embedded SQLite stores
//!
//! Every time a store is opened, stratum brings the database file to the
//! schema version the application expects, before any other code touches it:
//!
//! | Stored version       | Action                                             |
//! |----------------------|----------------------------------------------------|
//! | unset (`0`)          | create every entity, write the target version      |
//! | older than target    | apply migration steps; on any failure rebuild empty |
//! | equal to target      | nothing                                            |
//! | newer than target    | refuse to open (`StoreError::SchemaTooNew`)        |
//!
//! The version is kept in SQLite's `user_version` header cell and every path
//! commits its schema change together with the new version in one
//! transaction.
//!
//! # Feature Flags
//!
//! | Feature   | Description                          | Key Dependencies          |
//! |-----------|--------------------------------------|---------------------------|
//! | `display` | Table formatting with `tabled`       | `tabled`                  |
//! | `cli`     | The `stratum` command line binary    | `clap`, `tracing-subscriber` |
//!
//! # Architecture
//!
//! - **[`database`]**: the store itself
//!   - `core`: SQLite connection, version cell, entity descriptors
//!   - `migration`: migration directory scanning and step execution
//!   - `engine`: open-time reconciliation
//!   - `entities`: the application entity set at [`SCHEMA_VERSION`]
//! - **[`config`]**: configuration file and environment handling
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use stratum::{Database, DatabaseOptions, ENTITIES, FIELDS};
//!
//! let mut db = DatabaseOptions::new(ENTITIES, FIELDS, "/var/lib/node")
//!     .migrate_dir(Some(Path::new("/usr/share/stratum/migrations")))
//!     .open()?;
//!
//! assert_eq!(db.get_version()?, stratum::SCHEMA_VERSION);
//! db.close()?;
//! ```

pub mod config;
pub mod database;
pub mod utils;

// =============================================================================
// Configuration
// =============================================================================

pub use config::StratumConfig;
pub use config::{format_size, get_database_info, DatabaseInfo};

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

pub use database::{Database, DatabaseOptions, Reconciliation, DEFAULT_DB_NAME};

pub use database::{
    Column, ColumnKind, DatabaseConn, Entity, Field, Index, SchemaRegistry, SchemaStatus,
    VersionStore, MAX_VERSION, UNSET_VERSION,
};

pub use database::{
    MigrationError, MigrationRegistry, MigrationRunner, MigrationStep, StepInfo,
};

pub use database::{MigrationLog, StoreError, StoreResult, TracingLog};

pub use database::{ENTITIES, FIELDS, SCHEMA_VERSION};

pub use utils::OutputFormat;
