//! Cold-tier adapter.
//!
//! A partition archives to a single object: one JSON record per line,
//! keyed by the partition's path. Writes are idempotent (overwriting
//! the same key is allowed and retry-safe), reads decode lazily line
//! by line, and existence is a HEAD probe so the scheduler can check
//! state cheaply.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use object_store::ObjectStore;
use object_store::buffered::BufWriter;
use tokio::io::AsyncWriteExt;

use common::{RetryPolicy, with_retry};

use crate::error::{Error, Result};
use crate::hot::HotCursor;
use crate::model::LogRecord;
use crate::partition::PartitionId;

/// Whether an object store error is worth retrying.
fn transient(e: &object_store::Error) -> bool {
    !matches!(
        e,
        object_store::Error::NotFound { .. }
            | object_store::Error::AlreadyExists { .. }
            | object_store::Error::InvalidPath { .. }
            | object_store::Error::NotSupported { .. }
    )
}

fn encode_line(record: &LogRecord) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(record).map_err(|e| Error::ColdTier(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}

/// Adapter over the object store.
///
/// Constructed once at startup and shared; all methods take `&self`
/// and are safe to call concurrently.
pub struct ColdTier {
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
}

impl ColdTier {
    pub fn new(store: Arc<dyn ObjectStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Stores a full partition as one newline-delimited object.
    pub async fn put_partition(&self, partition: &PartitionId, records: &[LogRecord]) -> Result<()> {
        let mut body = Vec::new();
        for record in records {
            body.extend_from_slice(&encode_line(record)?);
        }
        let payload = Bytes::from(body);
        let path = partition.object_path();
        with_retry(
            &self.retry,
            || self.store.put(&path, payload.clone().into()),
            transient,
        )
        .await?;
        Ok(())
    }

    /// Streams a hot-tier cursor straight into the partition's object
    /// without buffering the whole partition, page by page through a
    /// multipart upload. Returns the number of records written.
    ///
    /// Not retried as a whole: the cursor is not restartable, so on
    /// failure the upload is aborted and the caller's next tick starts
    /// over from a fresh drain.
    pub async fn put_partition_from(
        &self,
        partition: &PartitionId,
        cursor: &mut HotCursor,
    ) -> Result<u64> {
        let mut writer = BufWriter::new(Arc::clone(&self.store), partition.object_path());
        let mut count = 0u64;
        loop {
            let page = match cursor.next_page().await {
                Ok(page) => page,
                Err(e) => {
                    let _ = writer.abort().await;
                    return Err(e);
                }
            };
            if page.is_empty() {
                break;
            }
            for record in &page {
                let line = match encode_line(record) {
                    Ok(line) => line,
                    Err(e) => {
                        let _ = writer.abort().await;
                        return Err(e);
                    }
                };
                if let Err(e) = writer.write_all(&line).await {
                    let _ = writer.abort().await;
                    return Err(Error::ColdTier(e.to_string()));
                }
                count += 1;
            }
        }
        writer
            .shutdown()
            .await
            .map_err(|e| Error::ColdTier(e.to_string()))?;
        Ok(count)
    }

    /// Opens a lazy, line-by-line decoded read over the partition's
    /// object. `None` when the partition has not been archived.
    pub async fn get_partition(
        &self,
        partition: &PartitionId,
    ) -> Result<Option<ColdPartitionStream>> {
        let path = partition.object_path();
        match with_retry(&self.retry, || self.store.get(&path), transient).await {
            Ok(result) => Ok(Some(ColdPartitionStream::new(result.into_stream()))),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Cheap probe: has this partition completed migration?
    pub async fn exists(&self, partition: &PartitionId) -> Result<bool> {
        let path = partition.object_path();
        match with_retry(&self.retry, || self.store.head(&path), transient).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the partition's object. Test and cleanup paths only;
    /// steady-state migration never deletes from the cold tier.
    pub async fn delete_partition(&self, partition: &PartitionId) -> Result<()> {
        let path = partition.object_path();
        match with_retry(&self.retry, || self.store.delete(&path), transient).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Lazy decoder over one archived partition.
///
/// Finite and not restartable; re-open via
/// [`ColdTier::get_partition`] for a fresh pass. Dropping it closes
/// the underlying object read.
pub struct ColdPartitionStream {
    inner: BoxStream<'static, object_store::Result<Bytes>>,
    buf: Vec<u8>,
    done: bool,
}

impl ColdPartitionStream {
    fn new(inner: BoxStream<'static, object_store::Result<Bytes>>) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            done: false,
        }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        Some(line)
    }

    fn parse(line: &[u8]) -> Result<LogRecord> {
        serde_json::from_slice(line)
            .map_err(|e| Error::ColdTier(format!("corrupt archive line: {e}")))
    }

    /// Returns the next record, or `None` at end of object.
    pub async fn next(&mut self) -> Result<Option<LogRecord>> {
        loop {
            if let Some(line) = self.take_line() {
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(Self::parse(&line)?));
            }
            if self.done {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                // final line without a trailing newline
                let line = std::mem::take(&mut self.buf);
                return Ok(Some(Self::parse(&line)?));
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.done = true;
                    return Err(e.into());
                }
                None => self.done = true,
            }
        }
    }
}
