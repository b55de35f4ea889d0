//! Persistent item store backed by redb.
//!
//! Each store table lives in its own redb table keyed by the bincode-encoded
//! primary key. Table schemas are persisted in the catalog and cached in
//! memory. All writes are synchronous (write txn + commit).

use crate::error::{LocalStoreError, LocalStoreResult};
use crate::tables::{self, TableSchema};
use crate::update::apply_updates;
use keyway_client::{ScanInput, ScanOutput};
use keyway_common::{AttributeUpdates, ConsumedCapacity, Item, Key, WriteRequest};
use parking_lot::RwLock;
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable};
use std::collections::HashMap;
use std::ops::Bound;
use std::path::Path;
use tracing::{error, info};
use xxhash_rust::xxh64::xxh64;

/// Size of one capacity unit
const CAPACITY_UNIT_BYTES: usize = 4 * 1024;

/// A scan page stops once this many bytes were read
pub const MAX_SCAN_PAGE_BYTES: usize = 1024 * 1024;

/// Persistent item store backed by redb.
pub struct LocalStore {
    db: Database,
    schemas: RwLock<HashMap<String, TableSchema>>,
    /// Entries processed per batch call; the rest come back unprocessed
    batch_capacity: RwLock<Option<usize>>,
}

impl LocalStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> LocalStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_database(Database::create(path)?)
    }

    /// Create a store that lives in memory only
    pub fn in_memory() -> LocalStoreResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::with_database(db)
    }

    fn with_database(db: Database) -> LocalStoreResult<Self> {
        // Create the catalog eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::CATALOG)?;
        }
        write_txn.commit()?;

        let store = Self {
            db,
            schemas: RwLock::new(HashMap::new()),
            batch_capacity: RwLock::new(None),
        };
        let schemas: HashMap<String, TableSchema> = store
            .load_bincode_table::<TableSchema>(tables::CATALOG)?
            .into_iter()
            .collect();
        *store.schemas.write() = schemas;
        Ok(store)
    }

    /// Register a table whose items are identified by `hash_key`
    pub fn create_table(&self, name: &str, hash_key: &str) -> LocalStoreResult<()> {
        if name.is_empty() || hash_key.is_empty() {
            return Err(LocalStoreError::validation(
                "table name and hash key must not be empty",
            ));
        }
        if self.schemas.read().contains_key(name) {
            return Err(LocalStoreError::TableExists(name.to_string()));
        }

        let schema = TableSchema {
            name: name.to_string(),
            hash_key: hash_key.to_string(),
        };
        let bytes = bincode::serialize(&schema)?;
        let items_name = tables::items_table_name(name);
        let write_txn = self.db.begin_write()?;
        {
            let mut catalog = write_txn.open_table(tables::CATALOG)?;
            catalog.insert(name, bytes.as_slice())?;
            let _t = write_txn.open_table(tables::items_table(&items_name))?;
        }
        write_txn.commit()?;

        self.schemas.write().insert(name.to_string(), schema);
        info!(table = name, hash_key, "Created table");
        Ok(())
    }

    /// Registered tables, sorted by name
    pub fn tables(&self) -> Vec<TableSchema> {
        let mut tables: Vec<TableSchema> = self.schemas.read().values().cloned().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }

    /// Limit how many entries one batch call processes (`None`: no limit)
    pub fn set_batch_capacity(&self, capacity: Option<usize>) {
        *self.batch_capacity.write() = capacity;
    }

    pub(crate) fn batch_capacity(&self) -> Option<usize> {
        *self.batch_capacity.read()
    }

    pub(crate) fn schema(&self, table: &str) -> LocalStoreResult<TableSchema> {
        self.schemas
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| LocalStoreError::TableNotFound(table.to_string()))
    }

    // ---- Items (bincode) ----

    pub(crate) fn read_item(
        &self,
        schema: &TableSchema,
        key: &Key,
    ) -> LocalStoreResult<Option<Item>> {
        let encoded = encode_key(key)?;
        let items_name = tables::items_table_name(&schema.name);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::items_table(&items_name))?;
        let item = table
            .get(encoded.as_slice())?
            .map(|val| bincode::deserialize(val.value()))
            .transpose()?;
        Ok(item)
    }

    /// Items found for `keys`, in request order
    pub(crate) fn read_items(
        &self,
        schema: &TableSchema,
        keys: &[Key],
    ) -> LocalStoreResult<Vec<Item>> {
        let items_name = tables::items_table_name(&schema.name);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::items_table(&items_name))?;
        let mut result = Vec::with_capacity(keys.len());
        for key in keys {
            let encoded = encode_key(key)?;
            if let Some(val) = table.get(encoded.as_slice())? {
                result.push(bincode::deserialize(val.value())?);
            }
        }
        Ok(result)
    }

    /// Apply put/delete requests in one transaction
    pub(crate) fn apply_writes(
        &self,
        schema: &TableSchema,
        requests: &[(Key, WriteRequest)],
    ) -> LocalStoreResult<()> {
        let items_name = tables::items_table_name(&schema.name);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::items_table(&items_name))?;
            for (key, request) in requests {
                let encoded = encode_key(key)?;
                match request {
                    WriteRequest::Put { item } => {
                        let bytes = bincode::serialize(item)?;
                        table.insert(encoded.as_slice(), bytes.as_slice())?;
                    }
                    WriteRequest::Delete { .. } => {
                        table.remove(encoded.as_slice())?;
                    }
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Read-modify-write of one item; creates it when absent
    pub(crate) fn apply_update(
        &self,
        schema: &TableSchema,
        key: &Key,
        updates: &AttributeUpdates,
    ) -> LocalStoreResult<()> {
        let encoded = encode_key(key)?;
        let items_name = tables::items_table_name(&schema.name);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::items_table(&items_name))?;
            // Decode, then drop the guard before mutating
            let existing: Option<Item> = table
                .get(encoded.as_slice())?
                .map(|val| bincode::deserialize(val.value()))
                .transpose()?;
            let mut item = existing.unwrap_or_else(|| key.to_item());
            apply_updates(&mut item, &schema.hash_key, updates)?;
            let bytes = bincode::serialize(&item)?;
            table.insert(encoded.as_slice(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Evaluate one scan page in encoded-key order
    pub(crate) fn scan_page(
        &self,
        schema: &TableSchema,
        input: &ScanInput,
    ) -> LocalStoreResult<ScanOutput> {
        let start = input.exclusive_start_key.as_ref().map(encode_key).transpose()?;
        let lower = start.as_deref().map_or(Bound::Unbounded, Bound::Excluded);
        let limit = input.limit.map_or(usize::MAX, |l| l as usize);
        let segment = input.segment.zip(input.total_segments);

        let items_name = tables::items_table_name(&schema.name);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::items_table(&items_name))?;

        let mut items = Vec::new();
        let mut bytes_read = 0;
        let mut last_key: Option<Vec<u8>> = None;
        let mut more = false;
        for entry in table.range::<&[u8]>((lower, Bound::Unbounded))? {
            let (key, value) = entry?;
            let key = key.value();
            if let Some((segment, total)) = segment {
                if segment_of(key, total) != segment {
                    continue;
                }
            }
            if items.len() >= limit || bytes_read >= MAX_SCAN_PAGE_BYTES {
                more = true;
                break;
            }
            let value = value.value();
            bytes_read += key.len() + value.len();
            items.push(bincode::deserialize::<Item>(value)?);
            last_key = Some(key.to_vec());
        }

        let last_evaluated_key = match last_key {
            Some(bytes) if more => Some(bincode::deserialize::<Key>(&bytes)?),
            _ => None,
        };
        let count = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let consumed_capacity = input.return_consumed_capacity.then(|| ConsumedCapacity {
            table_name: schema.name.clone(),
            capacity_units: capacity_units(bytes_read, input.consistent),
        });

        Ok(ScanOutput {
            items,
            count,
            scanned_count: count,
            last_evaluated_key,
            consumed_capacity,
        })
    }

    // ---- Generic helpers ----

    fn load_bincode_table<T: serde::de::DeserializeOwned>(
        &self,
        table_def: redb::TableDefinition<&str, &[u8]>,
    ) -> LocalStoreResult<Vec<(String, T)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_def)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let key = entry.0.value().to_string();
            let bytes = entry.1.value();
            match bincode::deserialize::<T>(bytes) {
                Ok(val) => result.push((key, val)),
                Err(e) => error!("Failed to decode entry '{}': {}", key, e),
            }
        }
        Ok(result)
    }
}

pub(crate) fn encode_key(key: &Key) -> LocalStoreResult<Vec<u8>> {
    Ok(bincode::serialize(key)?)
}

/// Segment an encoded key belongs to
pub fn segment_of(encoded_key: &[u8], total_segments: u32) -> u32 {
    let total = u64::from(total_segments.max(1));
    // remainder < total_segments
    (xxh64(encoded_key, 0) % total) as u32
}

/// Capacity units for `bytes` read: whole 4 KiB units, halved for eventual reads
pub fn capacity_units(bytes: usize, consistent: bool) -> f64 {
    let units = bytes.div_ceil(CAPACITY_UNIT_BYTES) as f64;
    if consistent { units } else { units * 0.5 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyway_common::AttributeValue;
    use tempfile::tempdir;

    fn item(id: &str) -> Item {
        let mut item = Item::new();
        item.insert("id".into(), AttributeValue::from(id));
        item.insert("payload".into(), AttributeValue::from("x".repeat(100)));
        item
    }

    fn put_all(store: &LocalStore, schema: &TableSchema, ids: &[&str]) {
        let requests: Vec<(Key, WriteRequest)> = ids
            .iter()
            .map(|id| (Key::hash("id", *id), WriteRequest::put(item(id))))
            .collect();
        store.apply_writes(schema, &requests).unwrap();
    }

    #[test]
    fn test_catalog_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.redb");
        {
            let store = LocalStore::open(&path).unwrap();
            store.create_table("users", "id").unwrap();
            let schema = store.schema("users").unwrap();
            put_all(&store, &schema, &["a"]);
        }

        let store = LocalStore::open(&path).unwrap();
        let schema = store.schema("users").unwrap();
        assert_eq!(schema.hash_key, "id");
        assert!(store.read_item(&schema, &Key::hash("id", "a")).unwrap().is_some());
        assert!(matches!(
            store.create_table("users", "id"),
            Err(LocalStoreError::TableExists(_))
        ));
    }

    #[test]
    fn test_unknown_table() {
        let store = LocalStore::in_memory().unwrap();
        assert!(matches!(
            store.schema("missing"),
            Err(LocalStoreError::TableNotFound(_))
        ));
        assert!(store.tables().is_empty());
    }

    #[test]
    fn test_update_creates_missing_item() {
        let store = LocalStore::in_memory().unwrap();
        store.create_table("users", "id").unwrap();
        let schema = store.schema("users").unwrap();
        let key = Key::hash("id", "new");

        store.apply_update(&schema, &key, &AttributeUpdates::new()).unwrap();
        let item = store.read_item(&schema, &key).unwrap().unwrap();
        assert_eq!(item, key.to_item());
    }

    #[test]
    fn test_scan_pages_are_disjoint() {
        let store = LocalStore::in_memory().unwrap();
        store.create_table("users", "id").unwrap();
        let schema = store.schema("users").unwrap();
        let ids: Vec<String> = (0..10).map(|i| format!("u{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        put_all(&store, &schema, &refs);

        let mut input = ScanInput {
            table_name: "users".into(),
            limit: Some(4),
            ..ScanInput::default()
        };
        let mut seen = Vec::new();
        let mut pages = 0;
        loop {
            let page = store.scan_page(&schema, &input).unwrap();
            pages += 1;
            seen.extend(page.items.iter().map(|i| i["id"].clone()));
            match page.last_evaluated_key {
                Some(key) => input.exclusive_start_key = Some(key),
                None => break,
            }
        }

        assert_eq!(pages, 3);
        assert_eq!(seen.len(), 10);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_exact_page_has_no_last_key() {
        let store = LocalStore::in_memory().unwrap();
        store.create_table("users", "id").unwrap();
        let schema = store.schema("users").unwrap();
        put_all(&store, &schema, &["a", "b"]);

        let input = ScanInput {
            table_name: "users".into(),
            limit: Some(2),
            return_consumed_capacity: true,
            ..ScanInput::default()
        };
        let page = store.scan_page(&schema, &input).unwrap();
        assert_eq!(page.count, 2);
        assert!(page.last_evaluated_key.is_none());
        assert_eq!(page.consumed_capacity.unwrap().capacity_units, 0.5);
    }

    #[test]
    fn test_segments_partition_the_table() {
        let store = LocalStore::in_memory().unwrap();
        store.create_table("users", "id").unwrap();
        let schema = store.schema("users").unwrap();
        let ids: Vec<String> = (0..50).map(|i| format!("u{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        put_all(&store, &schema, &refs);

        let mut total = 0;
        for segment in 0..3 {
            let input = ScanInput {
                table_name: "users".into(),
                segment: Some(segment),
                total_segments: Some(3),
                ..ScanInput::default()
            };
            let page = store.scan_page(&schema, &input).unwrap();
            for item in &page.items {
                let key = encode_key(&Key::hash("id", item["id"].clone())).unwrap();
                assert_eq!(segment_of(&key, 3), segment);
            }
            total += page.items.len();
        }
        assert_eq!(total, 50);
    }

    #[test]
    fn test_capacity_units() {
        assert_eq!(capacity_units(0, true), 0.0);
        assert_eq!(capacity_units(1, true), 1.0);
        assert_eq!(capacity_units(4096, false), 0.5);
        assert_eq!(capacity_units(4097, false), 1.0);
    }
}
