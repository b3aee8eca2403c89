//! Write path: batch validation, partition grouping, hot-tier writes.
//!
//! A batch is validated in full before anything is written, so a
//! malformed timestamp rejects the whole batch. After that the writer
//! offers at-least-once semantics only: groups already written when a
//! later group fails are not rolled back, and clients that retry may
//! produce duplicates.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration};
use common::Clock;
use serde_json::Value;

use crate::cold::ColdTier;
use crate::error::{Error, Result};
use crate::hot::HotTier;
use crate::model::LogRecord;
use crate::partition::{PartitionId, partition_key};

/// Accepts batches of raw log entries for a service.
pub struct IngestWriter {
    hot: Arc<HotTier>,
    cold: Arc<ColdTier>,
    clock: Arc<dyn Clock>,
    retention_days: u32,
}

impl IngestWriter {
    pub fn new(
        hot: Arc<HotTier>,
        cold: Arc<ColdTier>,
        clock: Arc<dyn Clock>,
        retention_days: u32,
    ) -> Self {
        Self {
            hot,
            cold,
            clock,
            retention_days,
        }
    }

    /// Ingests a batch of raw entries for `service_id`.
    ///
    /// Entries are grouped by partition key, so a batch whose
    /// timestamps cross a UTC day boundary produces one hot-tier write
    /// per day. Writes older than the retention window are accepted as
    /// long as the target partition has not been archived yet; backfill
    /// into an archived partition is rejected, since the hot copy
    /// would never be re-merged into the existing cold object.
    ///
    /// Returns the number of records written.
    pub async fn ingest(&self, service_id: &str, batch: Vec<Value>) -> Result<usize> {
        let mut records = Vec::with_capacity(batch.len());
        for (i, raw) in batch.into_iter().enumerate() {
            let record = parse_record(service_id, raw)
                .map_err(|reason| Error::Validation(format!("log entry {i}: {reason}")))?;
            records.push(record);
        }

        let mut groups: BTreeMap<PartitionId, Vec<LogRecord>> = BTreeMap::new();
        for record in records {
            groups
                .entry(partition_key(service_id, record.timestamp))
                .or_default()
                .push(record);
        }

        let cutoff_day = (self.clock.now() - Duration::days(i64::from(self.retention_days)))
            .date_naive();
        for partition in groups.keys() {
            if partition.day < cutoff_day && self.cold.exists(partition).await? {
                return Err(Error::Validation(format!(
                    "partition {partition} is already archived; backfill writes are rejected"
                )));
            }
        }

        let total = groups.values().map(Vec::len).sum();
        for (partition, group) in &groups {
            self.hot.write(partition, group).await?;
        }
        Ok(total)
    }
}

/// Parses one raw entry, injecting the owning service.
///
/// `date` must be a numeric epoch-seconds value, either a JSON number
/// or a numeric string (clients send both). A `service_id` field in
/// the entry is discarded in favor of the path-supplied one.
fn parse_record(service_id: &str, raw: Value) -> std::result::Result<LogRecord, String> {
    let Value::Object(mut map) = raw else {
        return Err("log entry must be a JSON object".to_string());
    };

    let date = map
        .remove("date")
        .ok_or_else(|| "missing required field `date`".to_string())?;
    let secs = match &date {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .ok_or_else(|| format!("field `date` must be a numeric epoch timestamp, got {date}"))?;

    let millis = secs * 1000.0;
    let timestamp = if millis >= (i64::MIN as f64) && millis <= (i64::MAX as f64) {
        DateTime::from_timestamp_millis(millis.round() as i64)
    } else {
        None
    }
    .ok_or_else(|| format!("field `date` {secs} is out of range"))?;

    map.remove("service_id");

    let mut label = |key: &str| -> std::result::Result<String, String> {
        match map.remove(key) {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(format!("field `{key}` must be a string, got {other}")),
        }
    };
    let level = label("level")?;
    let category = label("category")?;
    let message = label("message")?;

    Ok(LogRecord {
        timestamp,
        service_id: service_id.to_string(),
        level,
        category,
        message,
        extra: map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{InMemorySearch, MockClock, RetryPolicy};
    use object_store::memory::InMemory;
    use serde_json::json;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    struct Fixture {
        search: Arc<InMemorySearch>,
        cold: Arc<ColdTier>,
        writer: IngestWriter,
    }

    fn setup() -> Fixture {
        let clock = Arc::new(MockClock::with_time(
            DateTime::from_timestamp(1_502_304_972, 0).unwrap(), // 2017-08-09
        ));
        let search = Arc::new(InMemorySearch::new(clock.clone()));
        let hot = Arc::new(HotTier::new(
            search.clone(),
            50,
            std::time::Duration::from_secs(120),
            fast_retry(),
        ));
        let cold = Arc::new(ColdTier::new(Arc::new(InMemory::new()), fast_retry()));
        let writer = IngestWriter::new(hot, cold.clone(), clock, 10);
        Fixture {
            search,
            cold,
            writer,
        }
    }

    fn entry(date: Value, message: &str) -> Value {
        json!({
            "message": message,
            "level": "low",
            "category": "category",
            "date": date,
        })
    }

    #[tokio::test]
    async fn should_write_batch_into_daily_partition() {
        // given
        let f = setup();

        // when
        let count = f
            .writer
            .ingest("1", vec![entry(json!(1_502_304_972.0), "log message")])
            .await
            .unwrap();

        // then
        assert_eq!(count, 1);
        assert_eq!(f.search.index_len("data-1-2017-08-09"), Some(1));
    }

    #[tokio::test]
    async fn should_accept_string_encoded_epoch() {
        // given
        let f = setup();

        // when
        let count = f
            .writer
            .ingest("1", vec![entry(json!("1502304972"), "m")])
            .await
            .unwrap();

        // then
        assert_eq!(count, 1);
        assert_eq!(f.search.index_len("data-1-2017-08-09"), Some(1));
    }

    #[tokio::test]
    async fn should_split_batch_across_day_boundary() {
        // given
        let f = setup();

        // when - one record per side of midnight UTC
        f.writer
            .ingest(
                "1",
                vec![
                    entry(json!(1_502_323_199), "before midnight"),
                    entry(json!(1_502_323_200), "after midnight"),
                ],
            )
            .await
            .unwrap();

        // then
        assert_eq!(f.search.index_len("data-1-2017-08-09"), Some(1));
        assert_eq!(f.search.index_len("data-1-2017-08-10"), Some(1));
    }

    #[tokio::test]
    async fn should_reject_whole_batch_on_malformed_timestamp() {
        // given
        let f = setup();

        // when
        let result = f
            .writer
            .ingest(
                "1",
                vec![
                    entry(json!(1_502_304_972), "fine"),
                    entry(json!("not-a-number"), "broken"),
                ],
            )
            .await;

        // then - validation precedes any write
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(f.search.index_len("data-1-2017-08-09"), None);
    }

    #[tokio::test]
    async fn should_reject_batch_with_missing_date() {
        // given
        let f = setup();

        // when
        let result = f
            .writer
            .ingest("1", vec![json!({"message": "no date"})])
            .await;

        // then
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn should_not_roll_back_groups_written_before_a_failure() {
        // given - the second day's index is broken in the backend
        let f = setup();
        f.search.inject_index_failures("data-1-2017-08-10", 3);

        // when
        let result = f
            .writer
            .ingest(
                "1",
                vec![
                    entry(json!(1_502_323_199), "day one"),
                    entry(json!(1_502_323_200), "day two"),
                ],
            )
            .await;

        // then - first group stays, error surfaces for the batch
        assert!(matches!(result, Err(Error::HotTier(_))));
        assert_eq!(f.search.index_len("data-1-2017-08-09"), Some(1));
        assert_eq!(f.search.index_len("data-1-2017-08-10"), None);
    }

    #[tokio::test]
    async fn should_preserve_extra_fields_opaquely() {
        // given
        let f = setup();
        let mut raw = entry(json!(1_502_304_972), "m");
        raw["host"] = json!("web-3");

        // when
        f.writer.ingest("1", vec![raw]).await.unwrap();

        // then - nothing to assert on the index contents beyond count
        assert_eq!(f.search.index_len("data-1-2017-08-09"), Some(1));
    }

    #[tokio::test]
    async fn should_accept_old_record_when_partition_not_archived() {
        // given - 15 days old, 10 day retention, nothing archived yet
        let f = setup();
        let old_secs = 1_502_304_972 - 15 * 86_400;

        // when
        let count = f
            .writer
            .ingest("1", vec![entry(json!(old_secs), "backfill")])
            .await
            .unwrap();

        // then
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn should_reject_backfill_into_archived_partition() {
        // given - the partition already has a cold object
        let f = setup();
        let old_secs: i64 = 1_502_304_972 - 15 * 86_400;
        let old_day = DateTime::from_timestamp(old_secs, 0).unwrap().date_naive();
        let partition = PartitionId::new("1", old_day);
        f.cold.put_partition(&partition, &[]).await.unwrap();

        // when
        let result = f
            .writer
            .ingest("1", vec![entry(json!(old_secs), "too late")])
            .await;

        // then
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
