//! Hot-tier adapter.
//!
//! Wraps the search backend with partition-aware operations: bulk
//! writes tagged with the partition's index, cursor-paged range
//! queries, delete-by-partition and partition discovery. Every
//! backend call goes through the shared retry policy; cursor expiry
//! is the one failure that is never retried (the result set may have
//! changed underneath).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{
    CursorId, RetryPolicy, SearchBackend, SearchDoc, SearchError, SearchQuery, with_retry,
};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::LogRecord;
use crate::partition::{INDEX_PREFIX, PartitionId};

/// Adapter over the indexing backend.
///
/// Constructed once at startup and shared; all methods take `&self`
/// and are safe to call concurrently.
pub struct HotTier {
    backend: Arc<dyn SearchBackend>,
    page_size: usize,
    cursor_ttl: Duration,
    retry: RetryPolicy,
}

impl HotTier {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        page_size: usize,
        cursor_ttl: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            page_size,
            cursor_ttl,
            retry,
        }
    }

    /// Appends records to a partition's index.
    ///
    /// Bulk, not transactional across records: a partial failure is
    /// surfaced by the backend as an error, never swallowed.
    pub async fn write(&self, partition: &PartitionId, records: &[LogRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let index = partition.index_name();
        let docs: Vec<SearchDoc> = records
            .iter()
            .map(|record| {
                Ok(SearchDoc {
                    index: index.clone(),
                    source: serde_json::to_value(record)
                        .map_err(|e| Error::Validation(e.to_string()))?,
                })
            })
            .collect::<Result<_>>()?;

        with_retry(
            &self.retry,
            || self.backend.bulk_write(docs.clone()),
            SearchError::is_transient,
        )
        .await?;
        Ok(())
    }

    /// Opens a cursor over every record of `service_id` in the given
    /// partitions with `start <= timestamp <= end`.
    ///
    /// Partitions that do not exist in the backend contribute nothing,
    /// so callers may pass every partition touching the range.
    pub async fn range_query(
        &self,
        service_id: &str,
        partitions: &[PartitionId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HotCursor> {
        let query = SearchQuery {
            indices: partitions.iter().map(PartitionId::index_name).collect(),
            service_id: service_id.to_string(),
            start_ms: start.timestamp_millis(),
            end_ms: end.timestamp_millis(),
            page_size: self.page_size,
        };
        let ttl = self.cursor_ttl;
        let page = with_retry(
            &self.retry,
            || self.backend.open_cursor(query.clone(), ttl),
            SearchError::is_transient,
        )
        .await?;

        HotCursor::new(Arc::clone(&self.backend), self.retry.clone(), page.hits, page.cursor)
    }

    /// Removes every record in the partition. Absent partitions are a
    /// no-op success, which makes concurrent archival retries safe.
    pub async fn delete_all(&self, partition: &PartitionId) -> Result<()> {
        let index = partition.index_name();
        with_retry(
            &self.retry,
            || self.backend.delete_by_index(&index),
            SearchError::is_transient,
        )
        .await?;
        Ok(())
    }

    /// Lists every partition currently present in the hot tier, across
    /// all services. Index names outside the partition scheme are
    /// skipped.
    pub async fn list_partitions(&self) -> Result<Vec<PartitionId>> {
        let names = with_retry(
            &self.retry,
            || self.backend.list_indices(INDEX_PREFIX),
            SearchError::is_transient,
        )
        .await?;
        Ok(names
            .iter()
            .filter_map(|name| PartitionId::from_index_name(name))
            .collect())
    }
}

fn parse_records(hits: Vec<Value>) -> Result<Vec<LogRecord>> {
    hits.into_iter()
        .map(|hit| {
            serde_json::from_value(hit)
                .map_err(|e| Error::HotTier(format!("malformed hot-tier document: {e}")))
        })
        .collect()
}

/// A paged read over the hot tier.
///
/// Exhausted when a pull returns nothing. Dropping the cursor releases
/// the server-side context, so a disconnected client does not leak it.
pub struct HotCursor {
    backend: Arc<dyn SearchBackend>,
    retry: RetryPolicy,
    cursor: Option<CursorId>,
    buffered: VecDeque<LogRecord>,
}

impl HotCursor {
    fn new(
        backend: Arc<dyn SearchBackend>,
        retry: RetryPolicy,
        first_hits: Vec<Value>,
        cursor: Option<CursorId>,
    ) -> Result<Self> {
        Ok(Self {
            backend,
            retry,
            cursor,
            buffered: parse_records(first_hits)?.into(),
        })
    }

    async fn fetch(&mut self) -> Result<Vec<LogRecord>> {
        let Some(cursor) = self.cursor.clone() else {
            return Ok(Vec::new());
        };
        let page = with_retry(
            &self.retry,
            || self.backend.next_page(&cursor),
            SearchError::is_transient,
        )
        .await?;
        self.cursor = page.cursor;
        parse_records(page.hits)
    }

    /// Returns the next page of records; empty means exhausted.
    pub async fn next_page(&mut self) -> Result<Vec<LogRecord>> {
        if !self.buffered.is_empty() {
            return Ok(self.buffered.drain(..).collect());
        }
        self.fetch().await
    }

    /// Returns the next record, or `None` once exhausted.
    pub async fn next(&mut self) -> Result<Option<LogRecord>> {
        loop {
            if let Some(record) = self.buffered.pop_front() {
                return Ok(Some(record));
            }
            if self.cursor.is_none() {
                return Ok(None);
            }
            let records = self.fetch().await?;
            self.buffered.extend(records);
            if self.buffered.is_empty() && self.cursor.is_none() {
                return Ok(None);
            }
        }
    }
}

impl Drop for HotCursor {
    fn drop(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            self.backend.release_cursor(&cursor);
        }
    }
}
