//! `StoreTransport` over the local store
//!
//! Enforces the request rules of the hosted store before touching redb:
//! per-call caps, no duplicate keys within one batch, and keys made of
//! exactly the hash key attribute. Batch calls honour the configured batch
//! capacity by handing back the tail of the request as unprocessed.

use crate::error::{LocalStoreError, LocalStoreResult};
use crate::store::LocalStore;
use crate::tables::TableSchema;
use async_trait::async_trait;
use keyway_client::{BatchGetOutput, BatchWriteOutput, ScanInput, ScanOutput, StoreTransport};
use keyway_common::config::{MAX_BATCH_GET_KEYS, MAX_BATCH_WRITE_REQUESTS};
use keyway_common::{AttributeUpdates, Item, Key, Result, WriteRequest};
use std::collections::HashSet;
use tracing::debug;

/// Check that `key` holds exactly the hash key, with a key-typed value
fn validate_key(schema: &TableSchema, key: &Key) -> LocalStoreResult<()> {
    match key.get(&schema.hash_key) {
        Some(value) if key.len() == 1 && value.is_key_type() => Ok(()),
        Some(value) if key.len() == 1 => Err(LocalStoreError::validation(format!(
            "hash key '{}' must be S, N or B, got {}",
            schema.hash_key,
            value.type_name()
        ))),
        _ => Err(LocalStoreError::validation(format!(
            "key {key} does not match the schema of '{}' (hash key '{}')",
            schema.name, schema.hash_key
        ))),
    }
}

/// Primary key of an item about to be written
fn key_of_item(schema: &TableSchema, item: &Item) -> LocalStoreResult<Key> {
    let key = Key::from_item(item, &[schema.hash_key.as_str()]).ok_or_else(|| {
        LocalStoreError::validation(format!(
            "item is missing hash key '{}' of '{}'",
            schema.hash_key, schema.name
        ))
    })?;
    validate_key(schema, &key)?;
    Ok(key)
}

fn check_batch_len(len: usize, cap: usize, what: &str) -> LocalStoreResult<()> {
    if len == 0 {
        return Err(LocalStoreError::validation(format!("{what} must not be empty")));
    }
    if len > cap {
        return Err(LocalStoreError::validation(format!(
            "{what} holds {len} entries, the limit is {cap}"
        )));
    }
    Ok(())
}

fn reject_duplicate<'a>(seen: &mut HashSet<&'a Key>, key: &'a Key) -> LocalStoreResult<()> {
    if seen.insert(key) {
        Ok(())
    } else {
        Err(LocalStoreError::validation(format!(
            "duplicate key {key} in one batch"
        )))
    }
}

impl LocalStore {
    /// Number of entries of a batch processed in this call
    fn processed_len(&self, len: usize) -> usize {
        self.batch_capacity().map_or(len, |capacity| capacity.min(len))
    }

    fn do_batch_get(&self, table: &str, mut keys: Vec<Key>) -> LocalStoreResult<BatchGetOutput> {
        let schema = self.schema(table)?;
        check_batch_len(keys.len(), MAX_BATCH_GET_KEYS, "batch get")?;
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            validate_key(&schema, key)?;
            reject_duplicate(&mut seen, key)?;
        }

        let unprocessed_keys = keys.split_off(self.processed_len(keys.len()));
        let items = self.read_items(&schema, &keys)?;
        debug!(
            table,
            requested = keys.len() + unprocessed_keys.len(),
            found = items.len(),
            unprocessed = unprocessed_keys.len(),
            "Batch get"
        );
        Ok(BatchGetOutput {
            items,
            unprocessed_keys,
        })
    }

    fn do_batch_write(
        &self,
        table: &str,
        mut requests: Vec<WriteRequest>,
    ) -> LocalStoreResult<BatchWriteOutput> {
        let schema = self.schema(table)?;
        check_batch_len(requests.len(), MAX_BATCH_WRITE_REQUESTS, "batch write")?;
        let keys = requests
            .iter()
            .map(|request| match request {
                WriteRequest::Put { item } => key_of_item(&schema, item),
                WriteRequest::Delete { key } => validate_key(&schema, key).map(|()| key.clone()),
            })
            .collect::<LocalStoreResult<Vec<Key>>>()?;
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            reject_duplicate(&mut seen, key)?;
        }

        let unprocessed_requests = requests.split_off(self.processed_len(requests.len()));
        let applied: Vec<(Key, WriteRequest)> = keys.into_iter().zip(requests).collect();
        self.apply_writes(&schema, &applied)?;
        debug!(
            table,
            applied = applied.len(),
            unprocessed = unprocessed_requests.len(),
            "Batch write"
        );
        Ok(BatchWriteOutput {
            unprocessed_requests,
        })
    }

    fn do_put(&self, table: &str, item: Item) -> LocalStoreResult<()> {
        let schema = self.schema(table)?;
        let key = key_of_item(&schema, &item)?;
        self.apply_writes(&schema, &[(key, WriteRequest::put(item))])
    }

    fn do_delete(&self, table: &str, key: Key) -> LocalStoreResult<()> {
        let schema = self.schema(table)?;
        validate_key(&schema, &key)?;
        self.apply_writes(&schema, &[(key.clone(), WriteRequest::delete(key))])
    }

    fn do_get(&self, table: &str, key: &Key) -> LocalStoreResult<Option<Item>> {
        let schema = self.schema(table)?;
        validate_key(&schema, key)?;
        self.read_item(&schema, key)
    }

    fn do_update(
        &self,
        table: &str,
        key: &Key,
        updates: &AttributeUpdates,
    ) -> LocalStoreResult<()> {
        let schema = self.schema(table)?;
        validate_key(&schema, key)?;
        self.apply_update(&schema, key, updates)
    }

    fn do_scan(&self, input: &ScanInput) -> LocalStoreResult<ScanOutput> {
        let schema = self.schema(&input.table_name)?;
        if let Some(key) = &input.exclusive_start_key {
            validate_key(&schema, key)?;
        }
        match (input.segment, input.total_segments) {
            (None, None) => {}
            (Some(segment), Some(total)) if segment < total => {}
            _ => {
                return Err(LocalStoreError::validation(
                    "segment and total_segments must be given together with segment < total",
                ));
            }
        }
        if input.limit == Some(0) {
            return Err(LocalStoreError::validation("limit must be at least 1"));
        }
        self.scan_page(&schema, input)
    }
}

// Single-node store: every read is consistent, the flag only affects
// reported capacity.
#[async_trait]
impl StoreTransport for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn get_item(&self, table: &str, key: Key, _consistent: bool) -> Result<Option<Item>> {
        Ok(self.do_get(table, &key)?)
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<()> {
        Ok(self.do_put(table, item)?)
    }

    async fn delete_item(&self, table: &str, key: Key) -> Result<()> {
        Ok(self.do_delete(table, key)?)
    }

    async fn update_item(&self, table: &str, key: Key, updates: AttributeUpdates) -> Result<()> {
        Ok(self.do_update(table, &key, &updates)?)
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput> {
        Ok(self.do_scan(&input)?)
    }

    async fn batch_get_item(
        &self,
        table: &str,
        keys: Vec<Key>,
        _consistent: bool,
    ) -> Result<BatchGetOutput> {
        Ok(self.do_batch_get(table, keys)?)
    }

    async fn batch_write_item(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteOutput> {
        Ok(self.do_batch_write(table, requests)?)
    }
}
