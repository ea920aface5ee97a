//! Report DTOs for the inspection CLI
//!
//! Defines the JSON printed for each command.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheStats, Expiry, KeyedValue};

/// A key and its value (`get`, `tag`)
#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub key: String,
    pub value: Option<Value>,
}

impl From<KeyedValue<Value>> for EntryReport {
    fn from(kv: KeyedValue<Value>) -> Self {
        Self {
            key: kv.key,
            value: Some(kv.value),
        }
    }
}

/// Acknowledgement of a write (`set`, `del`, `expire`, `clear`)
#[derive(Debug, Clone, Serialize)]
pub struct AckReport {
    pub message: String,
    pub changed: bool,
}

impl AckReport {
    pub fn new(message: impl Into<String>, changed: bool) -> Self {
        Self {
            message: message.into(),
            changed,
        }
    }
}

/// Number of entries affected by a bulk operation
#[derive(Debug, Clone, Serialize)]
pub struct CountReport {
    pub removed: usize,
}

/// Remaining lifetime of a key (`ttl`)
#[derive(Debug, Clone, Serialize)]
pub struct TtlReport {
    pub key: String,
    pub exists: bool,
    /// Remaining milliseconds; absent for missing or non-expiring keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
    pub expires: bool,
}

impl TtlReport {
    pub fn new(key: impl Into<String>, ttl: Option<Expiry>) -> Self {
        Self {
            key: key.into(),
            exists: ttl.is_some(),
            ttl_ms: ttl.and_then(|t| t.as_millis()),
            expires: matches!(ttl, Some(Expiry::After(_))),
        }
    }
}

/// Cache statistics (`stats`)
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub total_entries: usize,
    pub total_size: usize,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub eviction_count: u64,
    pub oldest_entry: Option<String>,
    pub newest_entry: Option<String>,
    pub timestamp: String,
}

impl From<CacheStats> for StatsReport {
    fn from(stats: CacheStats) -> Self {
        Self {
            total_entries: stats.total_entries,
            total_size: stats.total_size,
            hit_rate: stats.hit_rate,
            miss_rate: stats.miss_rate,
            eviction_count: stats.eviction_count,
            oldest_entry: stats.oldest_entry.and_then(format_millis),
            newest_entry: stats.newest_entry.and_then(format_millis),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Renders a Unix-millisecond timestamp as RFC 3339.
fn format_millis(ms: u64) -> Option<String> {
    let ms = i64::try_from(ms).ok()?;
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StatsCounters;
    use std::time::Duration;

    #[test]
    fn test_ttl_report() {
        let report = TtlReport::new("k", Some(Expiry::After(Duration::from_millis(1500))));
        assert!(report.exists);
        assert!(report.expires);
        assert_eq!(report.ttl_ms, Some(1500));

        let report = TtlReport::new("k", Some(Expiry::Never));
        assert!(report.exists);
        assert!(!report.expires);

        let json = serde_json::to_value(TtlReport::new("k", None)).unwrap();
        assert_eq!(json["exists"], false);
        assert!(json.get("ttl_ms").is_none());
    }

    #[test]
    fn test_stats_report_formats_timestamps() {
        let stats = CacheStats::derive(&StatsCounters::new(), vec![(0, 3), (86_400_000, 4)]);
        let report = StatsReport::from(stats);

        assert_eq!(report.total_entries, 2);
        assert_eq!(report.oldest_entry.as_deref(), Some("1970-01-01T00:00:00+00:00"));
        assert_eq!(report.newest_entry.as_deref(), Some("1970-01-02T00:00:00+00:00"));
    }

    #[test]
    fn test_entry_report_from_keyed_value() {
        let report = EntryReport::from(KeyedValue {
            key: "k".to_string(),
            value: serde_json::json!({"a": 1}),
        });
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["value"]["a"], 1);
    }
}
