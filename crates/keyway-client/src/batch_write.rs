//! Batch writer
//!
//! Applies any number of put/delete requests through the batch retry core.
//! Requests are forwarded as given: duplicates inside one chunk are not
//! collapsed here, the store decides how to treat them.

use crate::batch::{BatchEngine, BatchRound, RoundResult};
use crate::context::CallContext;
use crate::metrics::{BatchKind, BatchMetrics};
use crate::retry::RetryPolicy;
use crate::transport::{SharedTransport, StoreTransport};
use async_trait::async_trait;
use keyway_common::config::MAX_BATCH_WRITE_REQUESTS;
use keyway_common::{BatchIncomplete, Config, Result, WriteRequest};
use std::sync::Arc;

struct WriteRound<'a> {
    transport: &'a dyn StoreTransport,
    table: &'a str,
}

#[async_trait]
impl BatchRound for WriteRound<'_> {
    type Entry = WriteRequest;
    type Output = WriteRequest;

    const KIND: BatchKind = BatchKind::Write;

    async fn submit(
        &self,
        requests: &[WriteRequest],
    ) -> Result<RoundResult<WriteRequest, WriteRequest>> {
        let output = self
            .transport
            .batch_write_item(self.table, requests.to_vec())
            .await?;
        let applied = applied_requests(requests, &output.unprocessed_requests);
        Ok(RoundResult {
            completed: applied,
            unprocessed: output.unprocessed_requests,
        })
    }

    fn incomplete(applied: Vec<WriteRequest>, unprocessed: Vec<WriteRequest>) -> BatchIncomplete {
        BatchIncomplete::Write {
            applied,
            unprocessed,
        }
    }
}

/// Submitted requests minus the unprocessed ones, one occurrence at a time
fn applied_requests(submitted: &[WriteRequest], unprocessed: &[WriteRequest]) -> Vec<WriteRequest> {
    let mut remaining: Vec<&WriteRequest> = unprocessed.iter().collect();
    let mut applied = Vec::with_capacity(submitted.len().saturating_sub(unprocessed.len()));
    for request in submitted {
        match remaining.iter().position(|u| *u == request) {
            Some(pos) => {
                remaining.swap_remove(pos);
            }
            None => applied.push(request.clone()),
        }
    }
    applied
}

/// Batch write with chunking and unprocessed-request retries
#[derive(Clone)]
pub struct BatchWriter {
    transport: SharedTransport,
    engine: BatchEngine,
}

impl BatchWriter {
    /// Create a writer over a shared transport
    ///
    /// The chunk size is capped at the store's per-call limit.
    #[must_use]
    pub fn new(transport: SharedTransport, config: &Config, metrics: Arc<BatchMetrics>) -> Self {
        let engine = BatchEngine::new(
            RetryPolicy::from_config(&config.retry),
            config.batch.write_chunk_size.min(MAX_BATCH_WRITE_REQUESTS),
            config.batch.max_concurrent_chunks,
            metrics,
        );
        Self { transport, engine }
    }

    /// Create a writer with an explicit engine
    #[must_use]
    pub const fn with_engine(transport: SharedTransport, engine: BatchEngine) -> Self {
        Self { transport, engine }
    }

    /// Apply every request; returns the number applied
    pub async fn write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
        ctx: &CallContext,
    ) -> Result<usize> {
        let round = WriteRound {
            transport: self.transport.as_ref(),
            table,
        };
        let applied = self.engine.run(&round, requests, ctx).await?;
        Ok(applied.len())
    }
}
