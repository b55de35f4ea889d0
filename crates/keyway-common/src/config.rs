//! Configuration types for keyway
//!
//! This module defines the retry, batching and per-operation settings used by
//! the client and accessor crates. Every field has a default so a partial
//! file (or none at all) yields a working configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Store cap on keys per batch get call
pub const MAX_BATCH_GET_KEYS: usize = 100;

/// Store cap on requests per batch write call
pub const MAX_BATCH_WRITE_REQUESTS: usize = 25;

/// Environment variable prefix, e.g. `KEYWAY__RETRY__MAX_RETRIES=4`
pub const ENV_PREFIX: &str = "KEYWAY";

/// Root configuration for keyway
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Retry policy for unprocessed batch entries
    pub retry: RetryConfig,
    /// Batch chunking configuration
    pub batch: BatchConfig,
    /// Per-operation settings
    pub operation: OperationConfig,
}

impl Config {
    /// Load configuration from an optional file overlaid with environment
    /// variables, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration respects the store caps
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;
        self.batch.validate()
    }
}

/// Bounded exponential backoff with jitter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of re-issues for one chunk's unprocessed entries
    pub max_retries: u32,
    /// Delay before the first retry (milliseconds)
    pub base_delay_ms: u64,
    /// Upper bound on any single delay (milliseconds)
    pub max_delay_ms: u64,
    /// Randomize each delay in `[0, computed]`
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 8,
            base_delay_ms: 50,
            max_delay_ms: 5_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::configuration(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Batch chunking configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Keys per batch get call
    pub get_chunk_size: usize,
    /// Requests per batch write call
    pub write_chunk_size: usize,
    /// Chunks of one batch issued concurrently
    pub max_concurrent_chunks: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            get_chunk_size: MAX_BATCH_GET_KEYS,
            write_chunk_size: MAX_BATCH_WRITE_REQUESTS,
            max_concurrent_chunks: 4,
        }
    }
}

impl BatchConfig {
    fn validate(&self) -> Result<()> {
        check_chunk("batch.get_chunk_size", self.get_chunk_size, MAX_BATCH_GET_KEYS)?;
        check_chunk(
            "batch.write_chunk_size",
            self.write_chunk_size,
            MAX_BATCH_WRITE_REQUESTS,
        )?;
        if self.max_concurrent_chunks == 0 {
            return Err(Error::configuration(
                "batch.max_concurrent_chunks must be at least 1",
            ));
        }
        Ok(())
    }
}

fn check_chunk(field: &str, value: usize, cap: usize) -> Result<()> {
    if value == 0 || value > cap {
        return Err(Error::configuration(format!(
            "{field} must be between 1 and {cap}, got {value}"
        )));
    }
    Ok(())
}

/// Per-operation settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    /// Abort any accessor operation that runs longer than this (milliseconds)
    pub timeout_ms: Option<u64>,
}

impl OperationConfig {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
