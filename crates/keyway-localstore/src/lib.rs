//! keyway Local Store - embedded document store backed by redb
//!
//! Implements [`keyway_client::StoreTransport`] on a single node, following
//! the hosted store's request rules closely enough for local development and
//! end-to-end tests: per-call batch caps, duplicate-key rejection, batch
//! throttling through unprocessed entries, segmented scans and pagination.

pub mod error;
pub mod store;
pub mod tables;
pub mod transport;
pub mod update;

// Re-exports
pub use error::{LocalStoreError, LocalStoreResult};
pub use store::LocalStore;
pub use tables::TableSchema;
