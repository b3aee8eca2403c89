//! Partitioning scheme: one partition per service per UTC calendar day.
//!
//! A partition is the unit of storage and migration. It is never
//! persisted as its own entity; both tiers derive it from names:
//! the hot tier stores a partition as the index
//! `data-<service>-<YYYY-MM-DD>` and the cold tier as the object
//! `data/<service>/<YYYY-MM-DD>.ndjson`. The mapping is pure and
//! UTC-only, so it is stable across restarts and across languages.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use object_store::path::Path;

/// Prefix shared by every hot-tier index this service owns.
pub const INDEX_PREFIX: &str = "data-";

/// Identifies one service's records for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId {
    pub service_id: String,
    pub day: NaiveDate,
}

impl PartitionId {
    pub fn new(service_id: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            service_id: service_id.into(),
            day,
        }
    }

    /// Hot-tier index name, e.g. `data-1-2017-08-09`.
    pub fn index_name(&self) -> String {
        format!("{INDEX_PREFIX}{}-{}", self.service_id, self.day.format("%Y-%m-%d"))
    }

    /// Cold-tier object path, e.g. `data/1/2017-08-09.ndjson`.
    pub fn object_path(&self) -> Path {
        Path::from(format!(
            "data/{}/{}.ndjson",
            self.service_id,
            self.day.format("%Y-%m-%d")
        ))
    }

    /// Parses a hot-tier index name back into a partition id.
    ///
    /// Returns `None` for names outside the scheme (the hot tier may
    /// hold unrelated indices; listings skip them). Service ids may
    /// themselves contain dashes, so the date is taken from the fixed
    /// ten-character suffix.
    pub fn from_index_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(INDEX_PREFIX)?;
        if rest.len() < 12 {
            return None;
        }
        let (head, date_part) = rest.split_at(rest.len() - 10);
        let service_id = head.strip_suffix('-')?;
        if service_id.is_empty() {
            return None;
        }
        let day = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
        Some(Self::new(service_id, day))
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index_name())
    }
}

/// Maps a record to its partition: the service plus the timestamp's
/// UTC calendar date.
pub fn partition_key(service_id: &str, timestamp: DateTime<Utc>) -> PartitionId {
    PartitionId::new(service_id, timestamp.date_naive())
}

/// Inclusive instant bounds of one UTC day, at millisecond precision.
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    (start, end)
}

/// Every UTC calendar day touched by the inclusive instant range.
///
/// Empty when `start > end`.
pub fn days_touching(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let last = end.date_naive();
    let mut day = start.date_naive();
    while day <= last {
        days.push(day);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}
