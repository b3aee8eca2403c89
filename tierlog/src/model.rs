//! Core data types for the tiered log store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single log record.
///
/// Five fields are fixed; everything else a client sends rides along
/// opaquely in `extra` and survives hot-tier storage and cold-tier
/// serialization verbatim. Records are immutable once stored and carry
/// no caller-supplied identity: duplicate delivery is tolerated, not
/// deduplicated.
///
/// The timestamp serializes as `date` in epoch milliseconds, which is
/// also the form the hot-tier backend range-filters on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the event happened (UTC).
    #[serde(rename = "date", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Owning tenant. Injected at ingest from the request path.
    pub service_id: String,

    /// Severity label, uninterpreted.
    #[serde(default)]
    pub level: String,

    /// Client-defined grouping label.
    #[serde(default)]
    pub category: String,

    /// Log body.
    #[serde(default)]
    pub message: String,

    /// Any additional fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
