//! Application entity set
//!
//! Tables the node keeps in its local store, at [`SCHEMA_VERSION`].
//! Creating this set from scratch always yields exactly the v13 schema; any
//! change here must bump the version and ship a step in `migrations/`.

use crate::database::core::{Column, ColumnKind, Entity, Field, Index};

/// Current schema version
/// Increment this when changing any entity below
pub const SCHEMA_VERSION: u32 = 13;

/// Custom field types used by the entity set
pub const FIELDS: &[Field] = &[
    // Arbitrary-precision amounts, hex encoded
    Field::new("HexInteger", "TEXT"),
    Field::new("Json", "TEXT"),
    Field::new("Enum", "TEXT"),
];

const KNOWN_HOST_COLUMNS: &[Column] = &[
    Column::new("id", ColumnKind::Integer).primary_key(),
    Column::new("ip_address", ColumnKind::Text),
    Column::new("port", ColumnKind::Integer),
    Column::new("node_id", ColumnKind::Text).nullable(),
    Column::new("last_connected", ColumnKind::Timestamp),
    Column::new("is_seed", ColumnKind::Boolean).default("0"),
];

const KNOWN_HOST_INDEXES: &[Index] =
    &[Index::new("idx_known_host_address", &["ip_address", "port"]).unique()];

const PAYMENT_COLUMNS: &[Column] = &[
    Column::new("id", ColumnKind::Integer).primary_key(),
    Column::new("subtask", ColumnKind::Text).unique(),
    Column::new("payee", ColumnKind::Text),
    Column::new("value", ColumnKind::Field("HexInteger")),
    Column::new("status", ColumnKind::Field("Enum")).default("'awaiting'"),
    Column::new("details", ColumnKind::Field("Json")).default("'{}'"),
    Column::new("created", ColumnKind::Timestamp),
    Column::new("modified", ColumnKind::Timestamp),
    // Added in v13
    Column::new("charged_from_deposit", ColumnKind::Boolean).nullable(),
];

const PAYMENT_INDEXES: &[Index] = &[Index::new("idx_payment_status", &["status"])];

const INCOME_COLUMNS: &[Column] = &[
    Column::new("id", ColumnKind::Integer).primary_key(),
    Column::new("sender_node", ColumnKind::Text),
    Column::new("subtask", ColumnKind::Text),
    Column::new("payer_address", ColumnKind::Text),
    Column::new("value", ColumnKind::Field("HexInteger")),
    Column::new("accepted_ts", ColumnKind::Timestamp).nullable(),
    Column::new("transaction_hash", ColumnKind::Text).nullable(),
    Column::new("created", ColumnKind::Timestamp),
    Column::new("modified", ColumnKind::Timestamp),
];

const INCOME_INDEXES: &[Index] =
    &[Index::new("idx_income_sender_subtask", &["sender_node", "subtask"]).unique()];

const WALLET_OPERATION_COLUMNS: &[Column] = &[
    Column::new("id", ColumnKind::Integer).primary_key(),
    Column::new("tx_hash", ColumnKind::Text).nullable(),
    Column::new("direction", ColumnKind::Field("Enum")),
    Column::new("operation_type", ColumnKind::Field("Enum")),
    Column::new("status", ColumnKind::Field("Enum")),
    Column::new("sender_address", ColumnKind::Text),
    Column::new("recipient_address", ColumnKind::Text),
    Column::new("amount", ColumnKind::Field("HexInteger")),
    Column::new("currency", ColumnKind::Field("Enum")),
    Column::new("gas_cost", ColumnKind::Field("HexInteger")).default("'0x0'"),
    Column::new("payment_id", ColumnKind::Integer)
        .nullable()
        .references("payment(id)"),
    Column::new("created", ColumnKind::Timestamp),
    Column::new("modified", ColumnKind::Timestamp),
];

const WALLET_OPERATION_INDEXES: &[Index] = &[Index::new(
    "idx_wallet_operation_tx_hash",
    &["tx_hash"],
)];

const PERFORMANCE_COLUMNS: &[Column] = &[
    Column::new("environment_id", ColumnKind::Text).primary_key(),
    Column::new("value", ColumnKind::Real).default("0.0"),
    Column::new("min_accepted_step", ColumnKind::Real).default("300.0"),
    Column::new("cpu_usage", ColumnKind::Integer).default("0"),
];

/// All tables expected at [`SCHEMA_VERSION`], parents before children
pub const ENTITIES: &[Entity] = &[
    Entity::new("known_host", KNOWN_HOST_COLUMNS).with_indexes(KNOWN_HOST_INDEXES),
    Entity::new("payment", PAYMENT_COLUMNS).with_indexes(PAYMENT_INDEXES),
    Entity::new("income", INCOME_COLUMNS).with_indexes(INCOME_INDEXES),
    Entity::new("wallet_operation", WALLET_OPERATION_COLUMNS)
        .with_indexes(WALLET_OPERATION_INDEXES),
    Entity::new("performance", PERFORMANCE_COLUMNS),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{DatabaseConn, SchemaRegistry};
    use crate::database::log::TracingLog;
    use std::collections::HashSet;

    #[test]
    fn test_entity_names_are_unique() {
        let names: HashSet<_> = ENTITIES.iter().map(|e| e.name).collect();
        assert_eq!(names.len(), ENTITIES.len());
    }

    #[test]
    fn test_every_field_reference_resolves() {
        for entity in ENTITIES {
            assert!(entity.create_table_sql(FIELDS).is_ok(), "{}", entity.name);
        }
    }

    #[test]
    fn test_entity_set_creates_cleanly() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let log = TracingLog;
        let registry = SchemaRegistry::new(ENTITIES, FIELDS, &log);
        registry.create_all(&db.conn, SCHEMA_VERSION).unwrap();

        for entity in ENTITIES {
            let columns = db.column_names(entity.name).unwrap();
            let expected: Vec<String> =
                entity.columns.iter().map(|c| c.name.to_string()).collect();
            assert_eq!(columns, expected);
        }
    }
}
