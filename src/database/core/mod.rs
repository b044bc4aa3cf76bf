//! Core database infrastructure
//!
//! This module provides the foundational database components:
//! - `DatabaseConn`: SQLite connection wrapper with configuration
//! - `VersionStore`: the schema version cell in the database header
//! - `SchemaRegistry`: typed entity descriptors, create/drop of a whole set
//! - `SchemaStatus`: stored version classified against a target version

mod connection;
mod schema;
mod version;

pub use connection::{DatabaseConn, DEFAULT_BUSY_TIMEOUT};
pub use schema::{Column, ColumnKind, Entity, Field, Index, SchemaRegistry, SchemaStatus};
pub use version::{VersionStore, MAX_VERSION, UNSET_VERSION};
pub(crate) use version::check_version;
