//! keyway Query - typed access by primary key
//!
//! This crate provides the typed surface applications use:
//!
//! - **Record**: codec between typed records and store items
//! - **ChangeSet**: property-level update actions, validated at the edge
//! - **PrimaryKeyAccessor**: point, batch and scan operations on a hash-key table

pub mod hash_primary_key;
pub mod record;
pub mod update;

// Re-exports
pub use hash_primary_key::PrimaryKeyAccessor;
pub use record::{Record, attribute, required_attribute};
pub use update::{AttributeChange, ChangeSet};
