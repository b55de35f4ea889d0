//! Batch reader
//!
//! Resolves any number of keys into items through the batch retry core.
//! Two reconciliation strategies shape the output:
//!
//! - [`Trim`]: found items in discovery order, absent keys dropped
//! - [`Full`]: one slot per requested key, in request order, `None` if absent

use crate::batch::{BatchEngine, BatchRound, RoundResult};
use crate::context::CallContext;
use crate::metrics::{BatchKind, BatchMetrics};
use crate::retry::RetryPolicy;
use crate::transport::{SharedTransport, StoreTransport};
use async_trait::async_trait;
use keyway_common::config::MAX_BATCH_GET_KEYS;
use keyway_common::{BatchIncomplete, Config, Item, Key, Result, TableMetadata};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How found items are reconciled with the requested keys
pub trait Reconcile {
    type Output;

    fn reconcile(
        &self,
        table: &TableMetadata,
        requested: &[Key],
        found: Vec<Item>,
    ) -> Self::Output;
}

/// Order-preserving append: found items only
#[derive(Debug, Clone, Copy, Default)]
pub struct Trim;

impl Reconcile for Trim {
    type Output = Vec<Item>;

    fn reconcile(
        &self,
        _table: &TableMetadata,
        _requested: &[Key],
        found: Vec<Item>,
    ) -> Vec<Item> {
        found
    }
}

/// Index by key: one slot per requested key
#[derive(Debug, Clone, Copy, Default)]
pub struct Full;

impl Reconcile for Full {
    type Output = Vec<Option<Item>>;

    fn reconcile(
        &self,
        table: &TableMetadata,
        requested: &[Key],
        found: Vec<Item>,
    ) -> Vec<Option<Item>> {
        let index: HashMap<Key, Item> = found
            .into_iter()
            .filter_map(|item| table.key_of(&item).map(|key| (key, item)))
            .collect();
        requested.iter().map(|key| index.get(key).cloned()).collect()
    }
}

struct GetRound<'a> {
    transport: &'a dyn StoreTransport,
    table: &'a str,
    consistent: bool,
}

#[async_trait]
impl BatchRound for GetRound<'_> {
    type Entry = Key;
    type Output = Item;

    const KIND: BatchKind = BatchKind::Get;

    async fn submit(&self, keys: &[Key]) -> Result<RoundResult<Key, Item>> {
        let output = self
            .transport
            .batch_get_item(self.table, keys.to_vec(), self.consistent)
            .await?;
        Ok(RoundResult {
            completed: output.items,
            unprocessed: output.unprocessed_keys,
        })
    }

    fn incomplete(retrieved: Vec<Item>, unprocessed: Vec<Key>) -> BatchIncomplete {
        BatchIncomplete::Get {
            retrieved,
            unprocessed,
        }
    }
}

/// Batch get with chunking and unprocessed-key retries
#[derive(Clone)]
pub struct BatchReader {
    transport: SharedTransport,
    engine: BatchEngine,
}

impl BatchReader {
    /// Create a reader over a shared transport
    ///
    /// The chunk size is capped at the store's per-call limit.
    #[must_use]
    pub fn new(transport: SharedTransport, config: &Config, metrics: Arc<BatchMetrics>) -> Self {
        let engine = BatchEngine::new(
            RetryPolicy::from_config(&config.retry),
            config.batch.get_chunk_size.min(MAX_BATCH_GET_KEYS),
            config.batch.max_concurrent_chunks,
            metrics,
        );
        Self { transport, engine }
    }

    /// Create a reader with an explicit engine
    #[must_use]
    pub const fn with_engine(transport: SharedTransport, engine: BatchEngine) -> Self {
        Self { transport, engine }
    }

    /// Fetch `keys` and reconcile the results with `strategy`
    ///
    /// Duplicate keys are requested once; with [`Full`] every duplicate
    /// still gets its own slot.
    pub async fn get<S: Reconcile>(
        &self,
        table: &TableMetadata,
        keys: &[Key],
        consistent: bool,
        strategy: S,
        ctx: &CallContext,
    ) -> Result<S::Output> {
        let mut seen = HashSet::with_capacity(keys.len());
        let unique: Vec<Key> = keys.iter().filter(|k| seen.insert(*k)).cloned().collect();

        let round = GetRound {
            transport: self.transport.as_ref(),
            table: &table.name,
            consistent,
        };
        let found = self.engine.run(&round, unique, ctx).await?;
        Ok(strategy.reconcile(table, keys, found))
    }

    /// Found items in discovery order
    pub async fn get_trim(
        &self,
        table: &TableMetadata,
        keys: &[Key],
        consistent: bool,
        ctx: &CallContext,
    ) -> Result<Vec<Item>> {
        self.get(table, keys, consistent, Trim, ctx).await
    }

    /// One slot per requested key
    pub async fn get_full(
        &self,
        table: &TableMetadata,
        keys: &[Key],
        consistent: bool,
        ctx: &CallContext,
    ) -> Result<Vec<Option<Item>>> {
        self.get(table, keys, consistent, Full, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedTransport;
    use keyway_common::{AttributeValue, Error};
    use std::time::Duration;

    fn table() -> TableMetadata {
        TableMetadata::new("users", "id").with_attribute("id", "id")
    }

    fn item(id: u32) -> Item {
        let mut item = Item::new();
        item.insert("id".into(), AttributeValue::from(id));
        item.insert("name".into(), AttributeValue::from(format!("user-{id}")));
        item
    }

    fn reader(
        transport: Arc<ScriptedTransport>,
        chunk_size: usize,
        max_retries: u32,
    ) -> BatchReader {
        let engine = BatchEngine::new(
            RetryPolicy::new(max_retries, Duration::from_millis(5), Duration::from_millis(50)),
            chunk_size,
            2,
            Arc::new(BatchMetrics::new()),
        );
        BatchReader::with_engine(transport, engine)
    }

    fn seeded(ids: impl IntoIterator<Item = u32>) -> Arc<ScriptedTransport> {
        let transport = ScriptedTransport::new("id");
        for id in ids {
            transport.insert(item(id));
        }
        Arc::new(transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_mode_preserves_slots_across_chunks() {
        // even ids exist, odd ids are absent
        let transport = seeded((0..40).step_by(2));
        let reader = reader(transport.clone(), 7, 3);
        let table = table();
        let keys: Vec<Key> = (0..40).rev().map(|id| table.key(id)).collect();

        let slots = reader
            .get_full(&table, &keys, false, &CallContext::new())
            .await
            .unwrap();

        assert_eq!(slots.len(), keys.len());
        for (key, slot) in keys.iter().zip(&slots) {
            let id = key.get("id").and_then(AttributeValue::as_i64).unwrap();
            if id % 2 == 0 {
                assert_eq!(table.key_of(slot.as_ref().unwrap()).as_ref(), Some(key));
            } else {
                assert!(slot.is_none());
            }
        }
        assert_eq!(transport.batch_get_calls().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trim_mode_returns_found_subset_without_duplicates() {
        let transport = seeded(0..10);
        let reader = reader(transport.clone(), 4, 3);
        let table = table();
        let keys: Vec<Key> = [1, 3, 3, 42, 5, 1].iter().map(|id| table.key(*id)).collect();

        let items = reader
            .get_trim(&table, &keys, true, &CallContext::new())
            .await
            .unwrap();

        let found: Vec<Key> = items.iter().filter_map(|i| table.key_of(i)).collect();
        assert_eq!(found, vec![table.key(1), table.key(3), table.key(5)]);

        // duplicates were requested once, consistency forwarded
        let calls = transport.batch_get_calls();
        assert_eq!(calls.iter().map(Vec::len).sum::<usize>(), 4);
        assert!(transport.saw_consistent_batch_get());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unprocessed_below_ceiling_converges() {
        let transport = seeded(0..5);
        transport.script_unprocessed(vec![3, 2, 1]);
        let reader = reader(transport.clone(), 10, 5);
        let table = table();
        let keys: Vec<Key> = (0..5).map(|id| table.key(id)).collect();

        let slots = reader
            .get_full(&table, &keys, false, &CallContext::new())
            .await
            .unwrap();

        assert!(slots.iter().all(Option::is_some));
        let calls = transport.batch_get_calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[1].len(), 3);
        assert_eq!(calls[3].len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unprocessed_past_ceiling_fails_with_remaining_keys() {
        let transport = seeded(0..5);
        transport.always_leave_unprocessed(2);
        let reader = reader(transport.clone(), 10, 2);
        let table = table();
        let keys: Vec<Key> = (0..5).map(|id| table.key(id)).collect();

        let err = reader
            .get_trim(&table, &keys, false, &CallContext::new())
            .await
            .unwrap_err();

        match err {
            Error::BatchIncomplete(detail) => match *detail {
                BatchIncomplete::Get {
                    retrieved,
                    unprocessed,
                } => {
                    assert_eq!(retrieved.len(), 3);
                    assert_eq!(unprocessed, vec![table.key(3), table.key(4)]);
                }
                other => panic!("unexpected detail: {other:?}"),
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.batch_get_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_request_issues_no_calls() {
        let transport = seeded(0..3);
        let reader = reader(transport.clone(), 10, 2);

        let slots = reader
            .get_full(&table(), &[], false, &CallContext::new())
            .await
            .unwrap();
        assert!(slots.is_empty());
        assert!(transport.batch_get_calls().is_empty());
    }
}
