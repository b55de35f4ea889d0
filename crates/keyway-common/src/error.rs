//! Error types for keyway
//!
//! This module defines the common error types used throughout the system.

use crate::types::{Item, Key, WriteRequest};
use std::fmt;
use thiserror::Error;

/// Common result type for keyway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for keyway
#[derive(Debug, Error)]
pub enum Error {
    // Request errors
    #[error("validation error: {0}")]
    Validation(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    // Batch errors
    #[error("batch incomplete: {0}")]
    BatchIncomplete(Box<BatchIncomplete>),

    // Transport errors
    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timeout")]
    Timeout,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("storage error: {0}")]
    Storage(String),

    // Caller errors
    #[error("operation cancelled")]
    Cancelled,

    // Codec errors
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    // Internal errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a deserialization error
    pub fn deserialization(msg: impl Into<String>) -> Self {
        Self::Deserialization(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a retryable error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Throttled(_)
                | Self::Timeout
                | Self::ServiceUnavailable(_)
                | Self::ConnectionFailed(_)
        )
    }

    /// Check if this is a validation error
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if the operation was cancelled by the caller
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Remaining-work detail, if this is an incomplete batch
    #[must_use]
    pub fn batch_incomplete(&self) -> Option<&BatchIncomplete> {
        match self {
            Self::BatchIncomplete(incomplete) => Some(incomplete),
            _ => None,
        }
    }
}

impl From<BatchIncomplete> for Error {
    fn from(incomplete: BatchIncomplete) -> Self {
        Self::BatchIncomplete(Box::new(incomplete))
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

/// A batch whose retry ceiling ran out with entries still unprocessed
///
/// Carries both what completed and what remains so the caller can resume
/// with exactly the remaining entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchIncomplete {
    Get {
        /// Items retrieved before the ceiling was reached
        retrieved: Vec<Item>,
        /// Keys the store never processed
        unprocessed: Vec<Key>,
    },
    Write {
        /// Requests the store accepted
        applied: Vec<WriteRequest>,
        /// Requests the store never processed
        unprocessed: Vec<WriteRequest>,
    },
}

impl BatchIncomplete {
    /// Number of entries still unprocessed
    #[must_use]
    pub fn unprocessed_len(&self) -> usize {
        match self {
            Self::Get { unprocessed, .. } => unprocessed.len(),
            Self::Write { unprocessed, .. } => unprocessed.len(),
        }
    }

    /// Number of entries that completed
    #[must_use]
    pub fn completed_len(&self) -> usize {
        match self {
            Self::Get { retrieved, .. } => retrieved.len(),
            Self::Write { applied, .. } => applied.len(),
        }
    }

    /// Unprocessed keys of a get batch
    #[must_use]
    pub fn unprocessed_keys(&self) -> &[Key] {
        match self {
            Self::Get { unprocessed, .. } => unprocessed,
            Self::Write { .. } => &[],
        }
    }

    /// Unprocessed requests of a write batch
    #[must_use]
    pub fn unprocessed_requests(&self) -> &[WriteRequest] {
        match self {
            Self::Write { unprocessed, .. } => unprocessed,
            Self::Get { .. } => &[],
        }
    }
}

impl fmt::Display for BatchIncomplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get {
                retrieved,
                unprocessed,
            } => write!(
                f,
                "{} keys unprocessed after retries ({} items retrieved)",
                unprocessed.len(),
                retrieved.len()
            ),
            Self::Write {
                applied,
                unprocessed,
            } => write!(
                f,
                "{} write requests unprocessed after retries ({} applied)",
                unprocessed.len(),
                applied.len()
            ),
        }
    }
}
