//! Batch retry core
//!
//! Both batch protocols follow the same discipline:
//!
//! 1. Split the entries into chunks no larger than the store's per-call cap
//! 2. Submit each chunk; the store may hand back an unprocessed subset
//! 3. Re-submit exactly that subset after a jittered exponential backoff,
//!    with at most one attempt in flight per chunk
//! 4. Stop when the subset is empty or the retry ceiling is reached
//!
//! Chunks run concurrently (bounded). Every chunk runs to completion before
//! the batch outcome is decided, so one chunk giving up never cancels its
//! siblings. A non-retryable error from any chunk is returned as-is.
//! Otherwise any remaining unprocessed entries, including the pending entries
//! of a chunk whose retryable errors outlasted the budget, fail the whole call
//! with a single [`BatchIncomplete`] covering all chunks.

use crate::context::CallContext;
use crate::metrics::{BatchKind, BatchMetrics};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use keyway_common::{BatchIncomplete, Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one submission of a chunk
#[derive(Debug)]
pub struct RoundResult<E, O> {
    /// Results for entries the store completed
    pub completed: Vec<O>,
    /// Entries the store left for a later round
    pub unprocessed: Vec<E>,
}

/// One batch protocol: how to submit a chunk and how to report leftovers
#[async_trait]
pub trait BatchRound: Send + Sync {
    type Entry: Clone + Send + Sync;
    type Output: Send;

    const KIND: BatchKind;

    /// Issue one transport call for `entries`
    async fn submit(
        &self,
        entries: &[Self::Entry],
    ) -> Result<RoundResult<Self::Entry, Self::Output>>;

    /// Build the failure detail once the retry ceiling is exhausted
    fn incomplete(
        completed: Vec<Self::Output>,
        unprocessed: Vec<Self::Entry>,
    ) -> BatchIncomplete;
}

struct ChunkOutcome<E, O> {
    completed: Vec<O>,
    unprocessed: Vec<E>,
    error: Option<Error>,
}

/// Chunking and retry engine shared by the batch reader and writer
#[derive(Debug, Clone)]
pub struct BatchEngine {
    retry: RetryPolicy,
    chunk_size: usize,
    max_concurrent_chunks: usize,
    metrics: Arc<BatchMetrics>,
}

impl BatchEngine {
    /// Create an engine. Zero sizes are raised to one.
    #[must_use]
    pub fn new(
        retry: RetryPolicy,
        chunk_size: usize,
        max_concurrent_chunks: usize,
        metrics: Arc<BatchMetrics>,
    ) -> Self {
        Self {
            retry,
            chunk_size: chunk_size.max(1),
            max_concurrent_chunks: max_concurrent_chunks.max(1),
            metrics,
        }
    }

    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<BatchMetrics> {
        &self.metrics
    }

    /// Run all entries through `round`, returning completed results in chunk order
    pub async fn run<R: BatchRound>(
        &self,
        round: &R,
        entries: Vec<R::Entry>,
        ctx: &CallContext,
    ) -> Result<Vec<R::Output>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let total = entries.len();
        let chunks = into_chunks(entries, self.chunk_size);
        debug!(
            kind = R::KIND.as_str(),
            entries = total,
            chunks = chunks.len(),
            "Starting batch"
        );

        let outcomes: Vec<ChunkOutcome<R::Entry, R::Output>> =
            stream::iter(chunks.into_iter().enumerate())
                .map(|(index, chunk)| self.run_chunk(round, index, chunk, ctx))
                .buffered(self.max_concurrent_chunks)
                .collect()
                .await;

        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut completed = Vec::new();
        let mut unprocessed = Vec::new();
        let mut hard_error = None;
        let mut last_retryable = None;
        for outcome in outcomes {
            completed.extend(outcome.completed);
            unprocessed.extend(outcome.unprocessed);
            match outcome.error {
                Some(e) if e.is_retryable() => last_retryable = Some(e),
                Some(e) if hard_error.is_none() => hard_error = Some(e),
                _ => {}
            }
        }

        if let Some(e) = hard_error {
            return Err(e);
        }

        if !unprocessed.is_empty() {
            self.metrics.record_incomplete(R::KIND);
            warn!(
                kind = R::KIND.as_str(),
                completed = completed.len(),
                unprocessed = unprocessed.len(),
                max_retries = self.retry.max_retries(),
                last_error = ?last_retryable,
                "Batch retry ceiling exhausted"
            );
            return Err(R::incomplete(completed, unprocessed).into());
        }

        Ok(completed)
    }

    async fn run_chunk<R: BatchRound>(
        &self,
        round: &R,
        index: usize,
        chunk: Vec<R::Entry>,
        ctx: &CallContext,
    ) -> ChunkOutcome<R::Entry, R::Output> {
        let mut pending = chunk;
        let mut completed = Vec::new();
        let mut retry = 0;

        loop {
            self.metrics.record_call(R::KIND);
            match ctx.guard(round.submit(&pending)).await {
                Ok(result) => {
                    completed.extend(result.completed);
                    if result.unprocessed.is_empty() {
                        return ChunkOutcome {
                            completed,
                            unprocessed: Vec::new(),
                            error: None,
                        };
                    }
                    self.metrics
                        .record_unprocessed(R::KIND, result.unprocessed.len());
                    debug!(
                        kind = R::KIND.as_str(),
                        chunk = index,
                        unprocessed = result.unprocessed.len(),
                        retry,
                        "Store left entries unprocessed"
                    );
                    pending = result.unprocessed;
                }
                Err(e) if e.is_retryable() && retry < self.retry.max_retries() => {
                    self.metrics.record_retryable_error(R::KIND);
                    debug!(
                        kind = R::KIND.as_str(),
                        chunk = index,
                        retry,
                        "Retryable transport error: {}",
                        e
                    );
                }
                Err(e) => {
                    return ChunkOutcome {
                        completed,
                        unprocessed: pending,
                        error: Some(e),
                    };
                }
            }

            if retry >= self.retry.max_retries() {
                return ChunkOutcome {
                    completed,
                    unprocessed: pending,
                    error: None,
                };
            }

            let delay = self.retry.delay(retry);
            retry += 1;
            self.metrics.record_retry(R::KIND);
            if let Err(e) = ctx.sleep(delay).await {
                return ChunkOutcome {
                    completed,
                    unprocessed: pending,
                    error: Some(e),
                };
            }
        }
    }
}

/// Split without cloning; every chunk holds `1..=size` entries
fn into_chunks<T>(entries: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut chunks = Vec::with_capacity(entries.len().div_ceil(size));
    let mut iter = entries.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(size).collect());
    }
    chunks
}
