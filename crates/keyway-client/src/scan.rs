//! Segmented scan
//!
//! Each call evaluates exactly one page. Pagination state (the exclusive
//! start key and the segment) belongs to the caller, which can run one
//! scanner per segment in parallel to traverse a table.

use crate::context::CallContext;
use crate::transport::{ScanInput, SharedTransport};
use keyway_common::{ConsumedCapacity, Error, Item, Key, Result};
use tracing::debug;

/// Caller-owned scan state and page size
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Maximum number of items to evaluate in this page
    pub limit: Option<u32>,
    pub total_segments: Option<u32>,
    pub segment: Option<u32>,
    /// Resume strictly after this key
    pub exclusive_start_key: Option<Key>,
    pub consistent: bool,
}

impl ScanOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Scan only `segment` of `total_segments`
    #[must_use]
    pub const fn with_segment(mut self, segment: u32, total_segments: u32) -> Self {
        self.segment = Some(segment);
        self.total_segments = Some(total_segments);
        self
    }

    #[must_use]
    pub fn with_exclusive_start_key(mut self, key: Option<Key>) -> Self {
        self.exclusive_start_key = key;
        self
    }

    #[must_use]
    pub const fn with_consistent(mut self, consistent: bool) -> Self {
        self.consistent = consistent;
        self
    }

    /// Check the segment pair and limit before anything reaches the store
    pub fn validate(&self) -> Result<()> {
        match (self.segment, self.total_segments) {
            (None, None) => {}
            (Some(segment), Some(total)) => {
                if total == 0 {
                    return Err(Error::validation("total_segments must be at least 1"));
                }
                if segment >= total {
                    return Err(Error::validation(format!(
                        "segment {segment} out of range for {total} total segments"
                    )));
                }
            }
            (Some(_), None) => {
                return Err(Error::validation("segment requires total_segments"));
            }
            (None, Some(_)) => {
                return Err(Error::validation("total_segments requires segment"));
            }
        }
        if self.limit == Some(0) {
            return Err(Error::validation("limit must be at least 1"));
        }
        Ok(())
    }

    fn to_input(&self, table: &str) -> ScanInput {
        ScanInput {
            table_name: table.to_string(),
            limit: self.limit,
            exclusive_start_key: self.exclusive_start_key.clone(),
            segment: self.segment,
            total_segments: self.total_segments,
            consistent: self.consistent,
            return_consumed_capacity: true,
        }
    }
}

/// One page of scan results
#[derive(Clone, Debug, PartialEq)]
pub struct ScanPage<T> {
    pub records: Vec<T>,
    /// Items returned
    pub count: u32,
    /// Items evaluated before any store-side filtering
    pub scanned_count: u32,
    /// Absent when the table or segment is exhausted
    pub last_evaluated_key: Option<Key>,
    pub consumed_capacity: Option<ConsumedCapacity>,
}

impl<T> ScanPage<T> {
    /// Convert every record, keeping the page metadata unchanged
    pub fn try_map<U, F>(self, f: F) -> Result<ScanPage<U>>
    where
        F: FnMut(T) -> Result<U>,
    {
        let records = self.records.into_iter().map(f).collect::<Result<Vec<_>>>()?;
        Ok(ScanPage {
            records,
            count: self.count,
            scanned_count: self.scanned_count,
            last_evaluated_key: self.last_evaluated_key,
            consumed_capacity: self.consumed_capacity,
        })
    }

    /// No further page exists
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.last_evaluated_key.is_none()
    }

    /// Options for the page after this one, or `None` when exhausted
    #[must_use]
    pub fn next_options(&self, current: &ScanOptions) -> Option<ScanOptions> {
        self.last_evaluated_key.as_ref().map(|key| ScanOptions {
            exclusive_start_key: Some(key.clone()),
            ..current.clone()
        })
    }
}

/// Stateless single-page scanner
#[derive(Clone)]
pub struct SegmentedScanner {
    transport: SharedTransport,
}

impl SegmentedScanner {
    #[must_use]
    pub const fn new(transport: SharedTransport) -> Self {
        Self { transport }
    }

    /// Evaluate one page of `table` as described by `options`
    pub async fn scan(
        &self,
        table: &str,
        options: &ScanOptions,
        ctx: &CallContext,
    ) -> Result<ScanPage<Item>> {
        options.validate()?;

        let output = ctx.guard(self.transport.scan(options.to_input(table))).await?;
        debug!(
            table,
            transport = self.transport.name(),
            segment = ?options.segment,
            count = output.count,
            scanned = output.scanned_count,
            more = output.last_evaluated_key.is_some(),
            "Scanned page"
        );

        Ok(ScanPage {
            records: output.items,
            count: output.count,
            scanned_count: output.scanned_count,
            last_evaluated_key: output.last_evaluated_key,
            consumed_capacity: output.consumed_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedTransport;
    use crate::transport::ScanOutput;
    use keyway_common::AttributeValue;
    use std::sync::Arc;

    fn item(id: &str) -> Item {
        let mut item = Item::new();
        item.insert("id".into(), AttributeValue::from(id));
        item
    }

    #[test]
    fn test_validate_segments() {
        assert!(ScanOptions::new().validate().is_ok());
        assert!(ScanOptions::new().with_segment(3, 4).validate().is_ok());

        let invalid = [
            ScanOptions::new().with_segment(4, 4),
            ScanOptions::new().with_segment(0, 0),
            ScanOptions::new().with_limit(0),
            ScanOptions {
                segment: Some(1),
                ..ScanOptions::default()
            },
            ScanOptions {
                total_segments: Some(2),
                ..ScanOptions::default()
            },
        ];
        for options in invalid {
            assert!(options.validate().unwrap_err().is_validation(), "{options:?}");
        }
    }

    #[tokio::test]
    async fn test_scan_passes_state_through() {
        let transport = Arc::new(ScriptedTransport::new("id"));
        transport.push_scan_output(ScanOutput {
            items: vec![item("a"), item("b")],
            count: 2,
            scanned_count: 2,
            last_evaluated_key: Some(Key::hash("id", "b")),
            consumed_capacity: Some(ConsumedCapacity {
                table_name: "users".into(),
                capacity_units: 0.5,
            }),
        });
        let scanner = SegmentedScanner::new(transport.clone());

        let options = ScanOptions::new()
            .with_limit(2)
            .with_segment(1, 4)
            .with_exclusive_start_key(Some(Key::hash("id", "0")))
            .with_consistent(true);
        let page = scanner
            .scan("users", &options, &CallContext::new())
            .await
            .unwrap();

        assert_eq!(page.count, 2);
        assert_eq!(page.records.len(), 2);
        assert!(!page.is_last());
        assert_eq!(page.consumed_capacity.as_ref().unwrap().capacity_units, 0.5);

        let inputs = transport.scan_inputs();
        assert_eq!(
            inputs,
            vec![ScanInput {
                table_name: "users".into(),
                limit: Some(2),
                exclusive_start_key: Some(Key::hash("id", "0")),
                segment: Some(1),
                total_segments: Some(4),
                consistent: true,
                return_consumed_capacity: true,
            }]
        );

        let next = page.next_options(&options).unwrap();
        assert_eq!(next.exclusive_start_key, Some(Key::hash("id", "b")));
        assert_eq!(next.segment, Some(1));
    }

    #[tokio::test]
    async fn test_invalid_options_never_reach_the_store() {
        let transport = Arc::new(ScriptedTransport::new("id"));
        let scanner = SegmentedScanner::new(transport.clone());

        let err = scanner
            .scan("users", &ScanOptions::new().with_segment(2, 2), &CallContext::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(transport.scan_inputs().is_empty());
    }

    #[test]
    fn test_try_map_keeps_metadata() {
        let page = ScanPage {
            records: vec![item("a")],
            count: 1,
            scanned_count: 3,
            last_evaluated_key: None,
            consumed_capacity: None,
        };
        let mapped = page
            .try_map(|i| Ok(i["id"].as_s().unwrap_or_default().to_uppercase()))
            .unwrap();
        assert_eq!(mapped.records, vec!["A".to_string()]);
        assert_eq!(mapped.scanned_count, 3);
        assert!(mapped.is_last());
    }
}
