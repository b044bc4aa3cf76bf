//! Database schema management
//!
//! Entity sets are closed lists of typed table descriptors. The registry turns
//! them into `CREATE ... IF NOT EXISTS` / `DROP ... IF EXISTS` statements, so
//! both directions are safe to repeat.

use rusqlite::Connection;
use serde::Serialize;

use crate::database::core::connection::table_exists;
use crate::database::core::version::UNSET_VERSION;
use crate::database::error::{StoreError, StoreResult};
use crate::database::log::MigrationLog;

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    Blob,
    /// Stored as INTEGER 0/1
    Boolean,
    /// Unix seconds, stored as INTEGER
    Timestamp,
    /// Custom type resolved by name through the field set
    Field(&'static str),
}

/// Custom column type: a named alias for an SQL storage type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub sql_type: &'static str,
}

impl Field {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self { name, sql_type }
    }
}

/// Column definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub primary_key: bool,
    pub nullable: bool,
    pub unique: bool,
    /// Raw SQL default expression, e.g. `0` or `'pending'`
    pub default: Option<&'static str>,
    /// Referenced `table(column)`
    pub references: Option<&'static str>,
}

impl Column {
    /// A `NOT NULL` column without default
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            primary_key: false,
            nullable: false,
            unique: false,
            default: None,
            references: None,
        }
    }

    pub const fn primary_key(self) -> Self {
        Self {
            primary_key: true,
            ..self
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    pub const fn unique(self) -> Self {
        Self {
            unique: true,
            ..self
        }
    }

    pub const fn default(self, expr: &'static str) -> Self {
        Self {
            default: Some(expr),
            ..self
        }
    }

    pub const fn references(self, target: &'static str) -> Self {
        Self {
            references: Some(target),
            ..self
        }
    }

    fn sql_type(&self, fields: &[Field]) -> StoreResult<&'static str> {
        match self.kind {
            ColumnKind::Integer | ColumnKind::Boolean | ColumnKind::Timestamp => Ok("INTEGER"),
            ColumnKind::Real => Ok("REAL"),
            ColumnKind::Text => Ok("TEXT"),
            ColumnKind::Blob => Ok("BLOB"),
            ColumnKind::Field(name) => fields
                .iter()
                .find(|f| f.name == name)
                .map(|f| f.sql_type)
                .ok_or_else(|| {
                    StoreError::RebuildFailure(format!(
                        "Unknown field type '{}' for column '{}'",
                        name, self.name
                    ))
                }),
        }
    }

    fn definition(&self, fields: &[Field]) -> StoreResult<String> {
        let mut sql = format!("\"{}\" {}", self.name, self.sql_type(fields)?);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(expr) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(expr);
        }
        if let Some(target) = self.references {
            sql.push_str(" REFERENCES ");
            sql.push_str(target);
        }
        Ok(sql)
    }
}

/// Index definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
}

impl Index {
    pub const fn new(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            columns,
            unique: false,
        }
    }

    pub const fn unique(self) -> Self {
        Self {
            unique: true,
            ..self
        }
    }
}

/// Table definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entity {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indexes: &'static [Index],
}

impl Entity {
    pub const fn new(name: &'static str, columns: &'static [Column]) -> Self {
        Self {
            name,
            columns,
            indexes: &[],
        }
    }

    pub const fn with_indexes(self, indexes: &'static [Index]) -> Self {
        Self { indexes, ..self }
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this entity
    pub fn create_table_sql(&self, fields: &[Field]) -> StoreResult<String> {
        let columns = self
            .columns
            .iter()
            .map(|c| c.definition(fields))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
            self.name,
            columns.join(", ")
        ))
    }

    /// `CREATE INDEX IF NOT EXISTS` statements for this entity
    pub fn create_index_sql(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|idx| {
                let columns = idx
                    .columns
                    .iter()
                    .map(|c| format!("\"{}\"", c))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "CREATE {}INDEX IF NOT EXISTS \"{}\" ON \"{}\" ({})",
                    if idx.unique { "UNIQUE " } else { "" },
                    idx.name,
                    self.name,
                    columns
                )
            })
            .collect()
    }

    /// `DROP TABLE IF EXISTS` statement for this entity
    pub fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS \"{}\"", self.name)
    }
}

/// Schema registry for an entity set
///
/// Creates and drops every entity of the set. It never touches the schema
/// version; that is the engine's job.
pub struct SchemaRegistry<'a> {
    entities: &'a [Entity],
    fields: &'a [Field],
    log: &'a dyn MigrationLog,
}

impl<'a> SchemaRegistry<'a> {
    pub fn new(entities: &'a [Entity], fields: &'a [Field], log: &'a dyn MigrationLog) -> Self {
        Self {
            entities,
            fields,
            log,
        }
    }

    pub fn entities(&self) -> &'a [Entity] {
        self.entities
    }

    /// Create every entity that does not exist yet, with its indexes
    pub fn create_all(&self, conn: &Connection, version: u32) -> StoreResult<()> {
        self.log
            .info(&format!("Creating tables, schema version {}", version));

        for entity in self.entities {
            let sql = entity.create_table_sql(self.fields)?;
            conn.execute(&sql, []).map_err(|e| {
                StoreError::rebuild(&format!("Failed to create table '{}'", entity.name), e)
            })?;

            for index_sql in entity.create_index_sql() {
                conn.execute(&index_sql, []).map_err(|e| {
                    StoreError::rebuild(
                        &format!("Failed to create index on '{}'", entity.name),
                        e,
                    )
                })?;
            }
        }

        Ok(())
    }

    /// Drop every entity, children first; absent tables are skipped
    pub fn drop_all(&self, conn: &Connection) -> StoreResult<()> {
        self.log.info("Removing tables");

        for entity in self.entities.iter().rev() {
            conn.execute(&entity.drop_table_sql(), []).map_err(|e| {
                StoreError::rebuild(&format!("Failed to drop table '{}'", entity.name), e)
            })?;
        }

        Ok(())
    }

    /// Names of entities with no physical table
    pub fn missing_entities(&self, conn: &Connection) -> StoreResult<Vec<&'static str>> {
        let mut missing = Vec::new();
        for entity in self.entities {
            if !table_exists(conn, entity.name)? {
                missing.push(entity.name);
            }
        }
        Ok(missing)
    }
}

/// Status of the database schema relative to a target version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SchemaStatus {
    /// Database has never had a version written (fresh database)
    NotInitialized,

    /// Schema is at the target version
    Current { version: u32 },

    /// Schema is older than the target and must be migrated or rebuilt
    NeedsMigration { from: u32, to: u32 },

    /// Database is from a newer version (incompatible)
    Incompatible {
        database_version: u32,
        required_version: u32,
    },
}

impl SchemaStatus {
    /// Classify a stored version against the target version
    pub fn classify(stored: u32, target: u32) -> Self {
        if stored == UNSET_VERSION {
            SchemaStatus::NotInitialized
        } else if stored < target {
            SchemaStatus::NeedsMigration {
                from: stored,
                to: target,
            }
        } else if stored == target {
            SchemaStatus::Current { version: stored }
        } else {
            SchemaStatus::Incompatible {
                database_version: stored,
                required_version: target,
            }
        }
    }
}

impl std::fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaStatus::NotInitialized => write!(f, "not initialized"),
            SchemaStatus::Current { version } => write!(f, "current (v{})", version),
            SchemaStatus::NeedsMigration { from, to } => {
                write!(f, "needs migration (v{} -> v{})", from, to)
            }
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => write!(
                f,
                "incompatible (database v{}, supported v{})",
                database_version, required_version
            ),
        }
    }
}
