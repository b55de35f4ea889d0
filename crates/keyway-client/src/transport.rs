//! Store transport capability
//!
//! The transport is the connection to the document store. It is shared by
//! every accessor and component that uses it (`Arc<dyn StoreTransport>`) and
//! passed to them explicitly; nothing in this workspace owns it exclusively.
//!
//! Implementations report failures through [`keyway_common::Error`]:
//! malformed requests as `Validation`, throttling as `Throttled`, and so on.
//! Batch calls report entries the store did not complete as unprocessed
//! rather than as errors.

use async_trait::async_trait;
use keyway_common::{AttributeUpdates, ConsumedCapacity, Item, Key, Result, WriteRequest};
use std::sync::Arc;

/// Shared handle to a store transport
pub type SharedTransport = Arc<dyn StoreTransport>;

/// Parameters of a single scan call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanInput {
    pub table_name: String,
    /// Maximum number of items to evaluate
    pub limit: Option<u32>,
    /// Resume strictly after this key
    pub exclusive_start_key: Option<Key>,
    /// Segment to scan, `0..total_segments`
    pub segment: Option<u32>,
    pub total_segments: Option<u32>,
    pub consistent: bool,
    /// Ask the store to report consumed capacity
    pub return_consumed_capacity: bool,
}

/// Result of a single scan call
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanOutput {
    pub items: Vec<Item>,
    pub count: u32,
    pub scanned_count: u32,
    /// Absent when the table or segment is exhausted
    pub last_evaluated_key: Option<Key>,
    pub consumed_capacity: Option<ConsumedCapacity>,
}

/// Result of one batch get call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchGetOutput {
    /// Items found, in store order
    pub items: Vec<Item>,
    /// Keys the store did not process in this round
    pub unprocessed_keys: Vec<Key>,
}

/// Result of one batch write call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchWriteOutput {
    /// Requests the store did not process in this round
    pub unprocessed_requests: Vec<WriteRequest>,
}

/// Connection to a hash-partitioned document store
#[async_trait]
pub trait StoreTransport: Send + Sync {
    /// Transport name for logging
    fn name(&self) -> &str;

    /// Point lookup; `Ok(None)` when the key is absent
    async fn get_item(&self, table: &str, key: Key, consistent: bool) -> Result<Option<Item>>;

    /// Create or replace an item
    async fn put_item(&self, table: &str, item: Item) -> Result<()>;

    /// Remove an item; succeeds when the key is absent
    async fn delete_item(&self, table: &str, key: Key) -> Result<()>;

    /// Apply all attribute updates to one item atomically
    async fn update_item(&self, table: &str, key: Key, updates: AttributeUpdates) -> Result<()>;

    /// Evaluate one page of a scan
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput>;

    /// Fetch up to the store's per-call cap of keys
    async fn batch_get_item(
        &self,
        table: &str,
        keys: Vec<Key>,
        consistent: bool,
    ) -> Result<BatchGetOutput>;

    /// Apply up to the store's per-call cap of put/delete requests
    async fn batch_write_item(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteOutput>;
}
