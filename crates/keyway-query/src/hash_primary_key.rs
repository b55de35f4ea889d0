//! Access by hash primary key
//!
//! [`PrimaryKeyAccessor`] is the typed facade over one hash-key table. Point
//! operations go straight to the transport; batch operations go through the
//! batch reader and writer, which chunk requests and retry unprocessed
//! entries; scans evaluate a single caller-driven page.
//!
//! Every call runs under the accessor's call context, so a cancelled token
//! or an expired operation timeout surfaces as `Error::Cancelled`.

use crate::record::Record;
use crate::update::ChangeSet;
use keyway_client::{
    BatchMetrics, BatchReader, BatchWriter, CallContext, ScanOptions, ScanPage, SegmentedScanner,
    SharedTransport,
};
use keyway_common::{AttributeValue, Config, Item, Key, Result, TableMetadata, WriteRequest};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Typed access to a table keyed by a hash key of type `H`
pub struct PrimaryKeyAccessor<T, H> {
    transport: SharedTransport,
    table: Arc<TableMetadata>,
    reader: BatchReader,
    writer: BatchWriter,
    scanner: SegmentedScanner,
    metrics: Arc<BatchMetrics>,
    ctx: CallContext,
    _marker: PhantomData<fn() -> (T, H)>,
}

impl<T, H> Clone for PrimaryKeyAccessor<T, H> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            table: Arc::clone(&self.table),
            reader: self.reader.clone(),
            writer: self.writer.clone(),
            scanner: self.scanner.clone(),
            metrics: Arc::clone(&self.metrics),
            ctx: self.ctx.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, H> fmt::Debug for PrimaryKeyAccessor<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryKeyAccessor")
            .field("table", &self.table.name)
            .field("hash_key", &self.table.hash_key)
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}

impl<T, H> PrimaryKeyAccessor<T, H>
where
    T: Record,
    H: Into<AttributeValue>,
{
    /// Create an accessor with its own batch metrics
    #[must_use]
    pub fn new(transport: SharedTransport, table: Arc<TableMetadata>, config: &Config) -> Self {
        Self::with_metrics(transport, table, config, Arc::new(BatchMetrics::new()))
    }

    /// Create an accessor that records into shared batch metrics
    #[must_use]
    pub fn with_metrics(
        transport: SharedTransport,
        table: Arc<TableMetadata>,
        config: &Config,
        metrics: Arc<BatchMetrics>,
    ) -> Self {
        Self {
            reader: BatchReader::new(Arc::clone(&transport), config, Arc::clone(&metrics)),
            writer: BatchWriter::new(Arc::clone(&transport), config, Arc::clone(&metrics)),
            scanner: SegmentedScanner::new(Arc::clone(&transport)),
            ctx: CallContext::new().with_timeout(config.operation.timeout()),
            transport,
            table,
            metrics,
            _marker: PhantomData,
        }
    }

    /// Same accessor; every call also observes `token`
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        let mut accessor = self.clone();
        accessor.ctx = self.ctx.clone().with_cancellation(token);
        accessor
    }

    #[must_use]
    pub fn table(&self) -> &TableMetadata {
        &self.table
    }

    #[must_use]
    pub const fn metrics(&self) -> &Arc<BatchMetrics> {
        &self.metrics
    }

    fn keys(&self, hash_keys: impl IntoIterator<Item = H>) -> Vec<Key> {
        hash_keys.into_iter().map(|h| self.table.key(h)).collect()
    }

    fn decode(&self, item: Item) -> Result<T> {
        T::from_item(&self.table, item)
    }

    /// Remove the item; succeeds when it does not exist
    pub async fn delete(&self, hash_key: H) -> Result<()> {
        let key = self.table.key(hash_key);
        debug!(table = %self.table.name, key = %key, "Delete");
        self.ctx
            .run(self.transport.delete_item(&self.table.name, key))
            .await
    }

    /// Point lookup; `consistent` selects a strongly consistent read
    pub async fn get(&self, hash_key: H, consistent: bool) -> Result<Option<T>> {
        let key = self.table.key(hash_key);
        let item = self
            .ctx
            .run(self.transport.get_item(&self.table.name, key, consistent))
            .await?;
        item.map(|item| self.decode(item)).transpose()
    }

    /// Create or replace the item for `record`
    pub async fn put(&self, record: &T) -> Result<()> {
        self.ctx
            .run(self.transport.put_item(&self.table.name, record.to_item()))
            .await
    }

    /// Apply the declared subset of `changes` as one atomic update
    ///
    /// Changes to undeclared properties are dropped. The call is issued even
    /// when nothing declared remains, which creates the item if absent.
    pub async fn update(&self, hash_key: H, changes: &ChangeSet) -> Result<()> {
        let key = self.table.key(hash_key);
        let updates = changes.resolve(&self.table);
        debug!(
            table = %self.table.name,
            key = %key,
            requested = changes.len(),
            applied = updates.len(),
            "Update"
        );
        self.ctx
            .run(self.transport.update_item(&self.table.name, key, updates))
            .await
    }

    /// Evaluate one scan page and decode its records
    pub async fn scan(&self, options: &ScanOptions) -> Result<ScanPage<T>> {
        let page = self
            .ctx
            .run(self.scanner.scan(&self.table.name, options, &self.ctx))
            .await?;
        page.try_map(|item| self.decode(item))
    }

    /// Records for the keys that exist, in discovery order
    pub async fn batch_get(&self, hash_keys: impl IntoIterator<Item = H>) -> Result<Vec<T>> {
        let keys = self.keys(hash_keys);
        let items = self
            .ctx
            .run(self.reader.get_trim(&self.table, &keys, false, &self.ctx))
            .await?;
        items.into_iter().map(|item| self.decode(item)).collect()
    }

    /// One slot per requested key, in request order; `None` when absent
    pub async fn batch_get_full(
        &self,
        hash_keys: impl IntoIterator<Item = H>,
    ) -> Result<Vec<Option<T>>> {
        let keys = self.keys(hash_keys);
        let slots = self
            .ctx
            .run(self.reader.get_full(&self.table, &keys, false, &self.ctx))
            .await?;
        slots
            .into_iter()
            .map(|slot| slot.map(|item| self.decode(item)).transpose())
            .collect()
    }

    /// Delete every key, retrying unprocessed deletes
    pub async fn batch_delete(&self, hash_keys: impl IntoIterator<Item = H>) -> Result<()> {
        let requests: Vec<WriteRequest> = self
            .keys(hash_keys)
            .into_iter()
            .map(WriteRequest::delete)
            .collect();
        self.write(requests).await
    }

    /// Put every record, retrying unprocessed puts
    pub async fn batch_put(&self, records: &[T]) -> Result<()> {
        let requests: Vec<WriteRequest> = records
            .iter()
            .map(|record| WriteRequest::put(record.to_item()))
            .collect();
        self.write(requests).await
    }

    async fn write(&self, requests: Vec<WriteRequest>) -> Result<()> {
        let applied = self
            .ctx
            .run(self.writer.write(&self.table.name, requests, &self.ctx))
            .await?;
        debug!(table = %self.table.name, applied, "Batch write complete");
        Ok(())
    }
}
