//! Read path: merged streaming over both tiers.
//!
//! A query streams the hot tier first, then each archived day in
//! ascending date order. Records are never globally re-sorted and
//! never deduplicated; a partition caught mid-migration may appear in
//! both tiers and the client sees both copies. The hot tier filters
//! server-side; cold objects hold whole days, so their records are
//! filtered here against the requested range.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::Clock;
use tracing::warn;

use crate::cold::{ColdPartitionStream, ColdTier};
use crate::error::{Error, Result};
use crate::hot::{HotCursor, HotTier};
use crate::model::LogRecord;
use crate::partition::{PartitionId, days_touching};

/// Plans and opens merged reads across the tiers.
pub struct TieredQueryEngine {
    hot: Arc<HotTier>,
    cold: Arc<ColdTier>,
    clock: Arc<dyn Clock>,
    retention_days: u32,
}

impl TieredQueryEngine {
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

    /// Opens a stream over every record of `service_id` with
    /// `start <= timestamp <= end`, bounds inclusive.
    ///
    /// The hot cursor is opened eagerly so backend failures surface
    /// here rather than mid-stream. Cold days are only planned, not
    /// probed; only days old enough to have been archived are
    /// considered at all.
    pub async fn query(
        &self,
        service_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<LogQueryStream> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }

        let days = days_touching(start, end);
        let partitions: Vec<PartitionId> = days
            .iter()
            .map(|day| PartitionId::new(service_id, *day))
            .collect();
        let hot = self.hot.range_query(service_id, &partitions, start, end).await?;

        let cutoff_day = (self.clock.now() - Duration::days(i64::from(self.retention_days)))
            .date_naive();
        let cold_days: VecDeque<PartitionId> = partitions
            .into_iter()
            .filter(|p| p.day < cutoff_day)
            .collect();

        Ok(LogQueryStream {
            cold: Arc::clone(&self.cold),
            phase: Phase::Hot(hot),
            cold_days,
            start,
            end,
            emitted: 0,
        })
    }
}

enum Phase {
    Hot(HotCursor),
    Cold(Option<ColdPartitionStream>),
}

/// A merged read over both tiers.
///
/// Finite; exhausted once `next` returns `None`. Dropping it
/// mid-iteration releases the hot cursor and closes any open cold
/// read.
pub struct LogQueryStream {
    cold: Arc<ColdTier>,
    phase: Phase,
    cold_days: VecDeque<PartitionId>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    emitted: u64,
}

impl LogQueryStream {
    /// Records emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Returns the next record, or `None` once both tiers are drained.
    ///
    /// Hot-tier failures (including cursor expiry) abort the stream.
    /// A cold day that fails to open or decode is logged and skipped;
    /// the stream moves on to the next day.
    pub async fn next(&mut self) -> Result<Option<LogRecord>> {
        loop {
            match &mut self.phase {
                Phase::Hot(cursor) => match cursor.next().await? {
                    Some(record) => {
                        self.emitted += 1;
                        return Ok(Some(record));
                    }
                    None => self.phase = Phase::Cold(None),
                },
                Phase::Cold(Some(stream)) => match stream.next().await {
                    Ok(Some(record)) => {
                        if record.timestamp >= self.start && record.timestamp <= self.end {
                            self.emitted += 1;
                            return Ok(Some(record));
                        }
                    }
                    Ok(None) => self.phase = Phase::Cold(None),
                    Err(e) => {
                        warn!(error = %e, "archived day unreadable, skipping rest of it");
                        self.phase = Phase::Cold(None);
                    }
                },
                Phase::Cold(current @ None) => {
                    let Some(partition) = self.cold_days.pop_front() else {
                        return Ok(None);
                    };
                    match self.cold.get_partition(&partition).await {
                        Ok(Some(stream)) => *current = Some(stream),
                        Ok(None) => {}
                        Err(e) => {
                            warn!(partition = %partition, error = %e, "archived day unreadable, skipping");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::{InMemorySearch, MockClock, RetryPolicy};
    use object_store::ObjectStore;
    use object_store::memory::InMemory;
    use serde_json::Map;
    use std::time::Duration as StdDuration;

    const NOW_SECS: i64 = 1_502_304_972; // 2017-08-09 18:56:12 UTC

    fn record(service: &str, secs: i64, message: &str) -> LogRecord {
        LogRecord {
            timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
            service_id: service.to_string(),
            level: "info".to_string(),
            category: "test".to_string(),
            message: message.to_string(),
            extra: Map::new(),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    struct Fixture {
        store: Arc<InMemory>,
        hot: Arc<HotTier>,
        cold: Arc<ColdTier>,
        engine: TieredQueryEngine,
    }

    fn setup() -> Fixture {
        let clock = Arc::new(MockClock::with_time(
            DateTime::from_timestamp(NOW_SECS, 0).unwrap(),
        ));
        let search = Arc::new(InMemorySearch::new(clock.clone()));
        let hot = Arc::new(HotTier::new(
            search,
            2,
            StdDuration::from_secs(120),
            fast_retry(),
        ));
        let store = Arc::new(InMemory::new());
        let cold = Arc::new(ColdTier::new(store.clone(), fast_retry()));
        let engine = TieredQueryEngine::new(hot.clone(), cold.clone(), clock, 10);
        Fixture {
            store,
            hot,
            cold,
            engine,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn secs_of(d: NaiveDate, h: u32) -> i64 {
        d.and_hms_opt(h, 0, 0).unwrap().and_utc().timestamp()
    }

    async fn collect(stream: &mut LogQueryStream) -> Vec<LogRecord> {
        let mut records = Vec::new();
        while let Some(record) = stream.next().await.unwrap() {
            records.push(record);
        }
        records
    }

    #[tokio::test]
    async fn should_reject_inverted_range() {
        // given
        let f = setup();

        // when
        let result = f.engine.query("1", ts(NOW_SECS), ts(NOW_SECS - 1)).await;

        // then
        assert!(matches!(result, Err(Error::InvalidRange { .. })));
    }

    #[tokio::test]
    async fn should_accept_instant_range() {
        // given - start == end is a one-instant range
        let f = setup();
        let hot_day = PartitionId::new("1", day(2017, 8, 9));
        f.hot
            .write(&hot_day, &[record("1", NOW_SECS, "exact")])
            .await
            .unwrap();

        // when
        let mut stream = f.engine.query("1", ts(NOW_SECS), ts(NOW_SECS)).await.unwrap();

        // then
        assert_eq!(collect(&mut stream).await.len(), 1);
    }

    #[tokio::test]
    async fn should_stream_empty_result() {
        // given
        let f = setup();

        // when
        let mut stream = f
            .engine
            .query("1", ts(NOW_SECS - 3_600), ts(NOW_SECS))
            .await
            .unwrap();

        // then
        assert!(collect(&mut stream).await.is_empty());
        assert_eq!(stream.emitted(), 0);
    }

    #[tokio::test]
    async fn should_stream_hot_records_for_recent_range() {
        // given
        let f = setup();
        let partition = PartitionId::new("1", day(2017, 8, 9));
        let records: Vec<LogRecord> = (0..5)
            .map(|i| record("1", NOW_SECS - 100 + i, &format!("m{i}")))
            .collect();
        f.hot.write(&partition, &records).await.unwrap();

        // when
        let mut stream = f
            .engine
            .query("1", ts(NOW_SECS - 3_600), ts(NOW_SECS))
            .await
            .unwrap();

        // then
        assert_eq!(collect(&mut stream).await, records);
        assert_eq!(stream.emitted(), 5);
    }

    #[tokio::test]
    async fn should_stream_hot_then_cold_days_ascending() {
        // given - two archived days and one hot day in range
        let f = setup();
        let cold_a = PartitionId::new("1", day(2017, 7, 20));
        let cold_b = PartitionId::new("1", day(2017, 7, 21));
        let hot_day = PartitionId::new("1", day(2017, 8, 9));
        f.cold
            .put_partition(&cold_a, &[record("1", secs_of(cold_a.day, 12), "cold-a")])
            .await
            .unwrap();
        f.cold
            .put_partition(&cold_b, &[record("1", secs_of(cold_b.day, 12), "cold-b")])
            .await
            .unwrap();
        f.hot
            .write(&hot_day, &[record("1", NOW_SECS, "hot")])
            .await
            .unwrap();

        // when - range spans all three days
        let mut stream = f
            .engine
            .query("1", ts(secs_of(cold_a.day, 0)), ts(NOW_SECS))
            .await
            .unwrap();
        let messages: Vec<String> = collect(&mut stream)
            .await
            .into_iter()
            .map(|r| r.message)
            .collect();

        // then - hot first, then archived days oldest to newest
        assert_eq!(messages, vec!["hot", "cold-a", "cold-b"]);
    }

    #[tokio::test]
    async fn should_filter_cold_records_to_requested_range() {
        // given - a whole archived day, but only part of it requested
        let f = setup();
        let cold_day = PartitionId::new("1", day(2017, 7, 20));
        f.cold
            .put_partition(
                &cold_day,
                &[
                    record("1", secs_of(cold_day.day, 3), "early"),
                    record("1", secs_of(cold_day.day, 12), "noon"),
                    record("1", secs_of(cold_day.day, 22), "late"),
                ],
            )
            .await
            .unwrap();

        // when
        let mut stream = f
            .engine
            .query(
                "1",
                ts(secs_of(cold_day.day, 10)),
                ts(secs_of(cold_day.day, 14)),
            )
            .await
            .unwrap();
        let records = collect(&mut stream).await;

        // then
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "noon");
    }

    #[tokio::test]
    async fn should_skip_cold_days_that_were_never_archived() {
        // given - an old range with only one of three days archived
        let f = setup();
        let archived = PartitionId::new("1", day(2017, 7, 21));
        f.cold
            .put_partition(&archived, &[record("1", secs_of(archived.day, 12), "only")])
            .await
            .unwrap();

        // when
        let mut stream = f
            .engine
            .query("1", ts(secs_of(day(2017, 7, 20), 0)), ts(secs_of(day(2017, 7, 22), 23)))
            .await
            .unwrap();
        let records = collect(&mut stream).await;

        // then
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "only");
    }

    #[tokio::test]
    async fn should_not_probe_cold_tier_inside_retention_window() {
        // given - a stray cold object for a recent day
        let f = setup();
        let recent = PartitionId::new("1", day(2017, 8, 8));
        f.cold
            .put_partition(&recent, &[record("1", secs_of(recent.day, 12), "stray")])
            .await
            .unwrap();

        // when
        let mut stream = f
            .engine
            .query("1", ts(secs_of(recent.day, 0)), ts(NOW_SECS))
            .await
            .unwrap();

        // then - only days past the retention cutoff are planned
        assert!(collect(&mut stream).await.is_empty());
    }

    #[tokio::test]
    async fn should_return_both_copies_mid_migration() {
        // given - a partition published to cold but not yet retired
        let f = setup();
        let partition = PartitionId::new("1", day(2017, 7, 20));
        let r = record("1", secs_of(partition.day, 12), "dup");
        f.hot.write(&partition, &[r.clone()]).await.unwrap();
        f.cold.put_partition(&partition, &[r.clone()]).await.unwrap();

        // when
        let mut stream = f
            .engine
            .query(
                "1",
                ts(secs_of(partition.day, 0)),
                ts(secs_of(partition.day, 23)),
            )
            .await
            .unwrap();

        // then - no dedup across tiers
        assert_eq!(collect(&mut stream).await, vec![r.clone(), r]);
    }

    #[tokio::test]
    async fn should_skip_corrupt_archived_day_and_continue() {
        // given - day one is garbage, day two is fine
        let f = setup();
        let bad = PartitionId::new("1", day(2017, 7, 20));
        let good = PartitionId::new("1", day(2017, 7, 21));
        f.store
            .put(&bad.object_path(), bytes::Bytes::from_static(b"not json\n").into())
            .await
            .unwrap();
        f.cold
            .put_partition(&good, &[record("1", secs_of(good.day, 12), "survivor")])
            .await
            .unwrap();

        // when
        let mut stream = f
            .engine
            .query("1", ts(secs_of(bad.day, 0)), ts(secs_of(good.day, 23)))
            .await
            .unwrap();
        let records = collect(&mut stream).await;

        // then
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "survivor");
    }

    #[tokio::test]
    async fn should_not_return_other_services_records() {
        // given
        let f = setup();
        let mine = PartitionId::new("1", day(2017, 8, 9));
        let theirs = PartitionId::new("2", day(2017, 8, 9));
        f.hot
            .write(&mine, &[record("1", NOW_SECS, "mine")])
            .await
            .unwrap();
        f.hot
            .write(&theirs, &[record("2", NOW_SECS, "theirs")])
            .await
            .unwrap();
        let cold_theirs = PartitionId::new("2", day(2017, 7, 20));
        f.cold
            .put_partition(
                &cold_theirs,
                &[record("2", secs_of(cold_theirs.day, 12), "cold-theirs")],
            )
            .await
            .unwrap();

        // when
        let mut stream = f
            .engine
            .query("1", ts(secs_of(day(2017, 7, 20), 0)), ts(NOW_SECS))
            .await
            .unwrap();
        let records = collect(&mut stream).await;

        // then
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "mine");
    }
}
