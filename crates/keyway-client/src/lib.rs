//! keyway Client - store transport and batch protocols
//!
//! This crate defines the [`StoreTransport`] capability consumed by every
//! component and implements the protocols layered on top of it:
//!
//! - **BatchReader**: resolves many keys into items, retrying unprocessed keys
//! - **BatchWriter**: applies many put/delete requests, retrying unprocessed ones
//! - **SegmentedScanner**: one scan page per call, pagination owned by the caller
//!
//! Both batch components share the retry core in [`batch`].

pub mod batch;
pub mod batch_get;
pub mod batch_write;
pub mod context;
pub mod metrics;
pub mod retry;
pub mod scan;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

// Re-exports
pub use batch_get::{BatchReader, Full, Reconcile, Trim};
pub use batch_write::BatchWriter;
pub use context::CallContext;
pub use metrics::{BatchKind, BatchMetrics, BatchMetricsSnapshot};
pub use retry::RetryPolicy;
pub use scan::{ScanOptions, ScanPage, SegmentedScanner};
pub use transport::{
    BatchGetOutput, BatchWriteOutput, ScanInput, ScanOutput, SharedTransport, StoreTransport,
};
