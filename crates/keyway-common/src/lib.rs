//! keyway Common - Shared types and utilities
//!
//! This crate provides the data model, error definitions and configuration
//! used across all keyway components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{BatchIncomplete, Error, Result};
pub use types::*;
