//! Batch protocol metrics for Prometheus
//!
//! Tracks transport calls, retries and unprocessed entries per batch kind.
//!
//! # Prometheus Metrics
//!
//! - `keyway_batch_calls_total{kind}` - Batch transport calls issued
//! - `keyway_batch_retries_total{kind}` - Re-issues of unprocessed entries
//! - `keyway_batch_unprocessed_entries_total{kind}` - Entries returned unprocessed
//! - `keyway_batch_incomplete_total{kind}` - Batches that exhausted the retry ceiling
//! - `keyway_batch_retryable_errors_total{kind}` - Retryable transport errors absorbed

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which batch protocol a metric belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    Get,
    Write,
}

impl BatchKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Write => "write",
        }
    }
}

#[derive(Debug, Default)]
struct KindCounters {
    calls: AtomicU64,
    retries: AtomicU64,
    unprocessed: AtomicU64,
    incomplete: AtomicU64,
    retryable_errors: AtomicU64,
}

impl KindCounters {
    fn snapshot(&self) -> KindSnapshot {
        KindSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            unprocessed: self.unprocessed.load(Ordering::Relaxed),
            incomplete: self.incomplete.load(Ordering::Relaxed),
            retryable_errors: self.retryable_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values for one batch kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindSnapshot {
    pub calls: u64,
    pub retries: u64,
    pub unprocessed: u64,
    pub incomplete: u64,
    pub retryable_errors: u64,
}

/// Point-in-time counter values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchMetricsSnapshot {
    pub get: KindSnapshot,
    pub write: KindSnapshot,
}

/// Batch protocol counters, shared by readers and writers
#[derive(Debug, Default)]
pub struct BatchMetrics {
    get: KindCounters,
    write: KindCounters,
}

impl BatchMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn counters(&self, kind: BatchKind) -> &KindCounters {
        match kind {
            BatchKind::Get => &self.get,
            BatchKind::Write => &self.write,
        }
    }

    pub fn record_call(&self, kind: BatchKind) {
        self.counters(kind).calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self, kind: BatchKind) {
        self.counters(kind).retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unprocessed(&self, kind: BatchKind, entries: usize) {
        self.counters(kind)
            .unprocessed
            .fetch_add(entries as u64, Ordering::Relaxed);
    }

    pub fn record_incomplete(&self, kind: BatchKind) {
        self.counters(kind).incomplete.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retryable_error(&self, kind: BatchKind) {
        self.counters(kind)
            .retryable_errors
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> BatchMetricsSnapshot {
        BatchMetricsSnapshot {
            get: self.get.snapshot(),
            write: self.write.snapshot(),
        }
    }

    /// Export metrics in Prometheus format
    #[must_use]
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(2 * 1024);
        let snapshot = self.snapshot();
        let kinds = [(BatchKind::Get, snapshot.get), (BatchKind::Write, snapshot.write)];

        let families: [(&str, &str, fn(&KindSnapshot) -> u64); 5] = [
            ("keyway_batch_calls_total", "Batch transport calls issued", |s| s.calls),
            ("keyway_batch_retries_total", "Re-issues of unprocessed entries", |s| {
                s.retries
            }),
            (
                "keyway_batch_unprocessed_entries_total",
                "Entries returned unprocessed by the store",
                |s| s.unprocessed,
            ),
            (
                "keyway_batch_incomplete_total",
                "Batches that exhausted the retry ceiling",
                |s| s.incomplete,
            ),
            (
                "keyway_batch_retryable_errors_total",
                "Retryable transport errors absorbed by retries",
                |s| s.retryable_errors,
            ),
        ];

        for (name, help, value) in families {
            let _ = writeln!(output, "# HELP {name} {help}");
            let _ = writeln!(output, "# TYPE {name} counter");
            for (kind, counters) in &kinds {
                let _ = writeln!(
                    output,
                    "{name}{{kind=\"{}\"}} {}",
                    kind.as_str(),
                    value(counters)
                );
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_per_kind() {
        let metrics = BatchMetrics::new();
        metrics.record_call(BatchKind::Get);
        metrics.record_call(BatchKind::Get);
        metrics.record_call(BatchKind::Write);
        metrics.record_unprocessed(BatchKind::Write, 5);
        metrics.record_retry(BatchKind::Write);
        metrics.record_incomplete(BatchKind::Get);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.get.calls, 2);
        assert_eq!(snapshot.get.incomplete, 1);
        assert_eq!(snapshot.write.calls, 1);
        assert_eq!(snapshot.write.unprocessed, 5);
        assert_eq!(snapshot.write.retries, 1);
        assert_eq!(snapshot.write.retryable_errors, 0);
    }

    #[test]
    fn test_export_prometheus() {
        let metrics = BatchMetrics::new();
        metrics.record_call(BatchKind::Write);
        metrics.record_retryable_error(BatchKind::Get);

        let output = metrics.export_prometheus();
        assert!(output.contains("# TYPE keyway_batch_calls_total counter"));
        assert!(output.contains("keyway_batch_calls_total{kind=\"write\"} 1"));
        assert!(output.contains("keyway_batch_calls_total{kind=\"get\"} 0"));
        assert!(output.contains("keyway_batch_retryable_errors_total{kind=\"get\"} 1"));
    }
}
