//! Redb table definitions for the local store.

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

// Key: store table name, Value: bincode-encoded TableSchema
pub const CATALOG: TableDefinition<&str, &[u8]> = TableDefinition::new("catalog");

/// Prefix of every item table, keeps user tables apart from the catalog
const ITEMS_PREFIX: &str = "items:";

/// Persisted definition of one store table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// Name of the hash key attribute
    pub hash_key: String,
}

/// Redb table name holding the items of `table`
///
/// Key: bincode-encoded primary key, Value: bincode-encoded item
pub fn items_table_name(table: &str) -> String {
    format!("{ITEMS_PREFIX}{table}")
}

/// Definition of an item table; `name` comes from [`items_table_name`]
pub fn items_table(name: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(name)
}
