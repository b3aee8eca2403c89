//! Hot-tier search backend primitives.
//!
//! The indexing cluster itself is outside this codebase; the tiered
//! store only ever touches it through [`SearchBackend`]: bulk writes,
//! scrolled (cursor-paged) searches, delete-by-query and index
//! listing. Documents are open JSON objects; the backend filters on
//! the `service_id` term and the numeric `date` field (epoch
//! milliseconds), which is how the adapters store records.
//!
//! [`InMemorySearch`] is the implementation used by tests and local
//! runs. Its cursors are clock-driven so expiry can be exercised with
//! a mock clock, and it supports injecting transient failures to test
//! retry paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::Clock;

/// Opaque server-side cursor handle.
pub type CursorId = String;

/// Errors surfaced by a search backend.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The cursor is unknown or its inactivity window elapsed.
    #[error("cursor expired or unknown: {0}")]
    CursorExpired(CursorId),

    /// Timeout or 5xx-class failure; safe to retry.
    #[error("transient backend error: {0}")]
    Transient(String),

    /// Malformed request; retrying will not help.
    #[error("backend rejected request: {0}")]
    Rejected(String),

    /// A bulk write indexed some documents but not all of them.
    #[error("bulk write partially failed: {failed} of {total} documents not indexed")]
    PartialBulk { failed: usize, total: usize },
}

impl SearchError {
    /// Whether the error is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, SearchError::Transient(_))
    }
}

pub type SearchResult<T> = Result<T, SearchError>;

/// A document to index: target index plus an open JSON object.
#[derive(Debug, Clone)]
pub struct SearchDoc {
    pub index: String,
    pub source: Value,
}

/// A scrolled range search over one service's documents.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Indices to search. Names that do not exist are silently empty,
    /// matching wildcard-index semantics.
    pub indices: Vec<String>,
    /// Required value of the `service_id` field.
    pub service_id: String,
    /// Inclusive lower bound on the `date` field (epoch millis).
    pub start_ms: i64,
    /// Inclusive upper bound on the `date` field (epoch millis).
    pub end_ms: i64,
    /// Maximum hits per page.
    pub page_size: usize,
}

/// One page of hits plus the cursor to fetch the next page.
///
/// A `None` cursor means the result set is exhausted.
#[derive(Debug)]
pub struct SearchPage {
    pub hits: Vec<Value>,
    pub cursor: Option<CursorId>,
}

/// The primitives the hot tier is accessed through.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Indexes a batch of documents. Partial success is reported as
    /// [`SearchError::PartialBulk`], never swallowed.
    async fn bulk_write(&self, docs: Vec<SearchDoc>) -> SearchResult<()>;

    /// Opens a server-side cursor over all matching documents and
    /// returns the first page. The cursor expires after `ttl` of
    /// inactivity.
    async fn open_cursor(&self, query: SearchQuery, ttl: Duration) -> SearchResult<SearchPage>;

    /// Advances a cursor. An empty page marks exhaustion.
    async fn next_page(&self, cursor: &CursorId) -> SearchResult<SearchPage>;

    /// Releases a cursor early. Synchronous so callers can invoke it
    /// from `Drop` when a client disconnects mid-iteration.
    fn release_cursor(&self, cursor: &CursorId);

    /// Removes every document in the given index. Deleting an absent
    /// index is a no-op success.
    async fn delete_by_index(&self, index: &str) -> SearchResult<()>;

    /// Lists index names starting with `prefix`, in lexicographic
    /// order.
    async fn list_indices(&self, prefix: &str) -> SearchResult<Vec<String>>;
}

/// Backend selection for the hot tier.
///
/// Only the in-memory backend is constructed here; a managed indexing
/// cluster plugs in through the same [`SearchBackend`] trait.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SearchConfig {
    #[default]
    InMemory,
}

/// Builds a search backend from configuration.
pub fn create_search_backend(config: &SearchConfig, clock: Arc<dyn Clock>) -> Arc<dyn SearchBackend> {
    match config {
        SearchConfig::InMemory => Arc::new(InMemorySearch::new(clock)),
    }
}

struct CursorState {
    hits: Vec<Value>,
    offset: usize,
    page_size: usize,
    ttl: Duration,
    last_access: DateTime<Utc>,
}

#[derive(Default)]
struct FailureInjection {
    bulk: u32,
    search: u32,
    delete: u32,
    /// Fail bulk writes touching one specific index.
    index: Option<(String, u32)>,
}

struct Inner {
    /// Index name -> documents in insertion order.
    indices: BTreeMap<String, Vec<Value>>,
    cursors: HashMap<CursorId, CursorState>,
    next_cursor: u64,
    failures: FailureInjection,
}

/// In-memory [`SearchBackend`].
pub struct InMemorySearch {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl InMemorySearch {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner {
                indices: BTreeMap::new(),
                cursors: HashMap::new(),
                next_cursor: 0,
                failures: FailureInjection::default(),
            }),
        }
    }

    /// Makes the next `n` bulk writes fail with a transient error.
    pub fn inject_bulk_failures(&self, n: u32) {
        self.inner.lock().unwrap().failures.bulk = n;
    }

    /// Makes the next `n` bulk writes that touch `index` fail with a
    /// transient error, leaving writes to other indices untouched.
    pub fn inject_index_failures(&self, index: &str, n: u32) {
        self.inner.lock().unwrap().failures.index = Some((index.to_string(), n));
    }

    /// Makes the next `n` search calls (open or advance) fail with a
    /// transient error.
    pub fn inject_search_failures(&self, n: u32) {
        self.inner.lock().unwrap().failures.search = n;
    }

    /// Makes the next `n` delete-by-index calls fail with a transient
    /// error.
    pub fn inject_delete_failures(&self, n: u32) {
        self.inner.lock().unwrap().failures.delete = n;
    }

    /// Number of documents currently held by an index, if it exists.
    pub fn index_len(&self, index: &str) -> Option<usize> {
        self.inner.lock().unwrap().indices.get(index).map(Vec::len)
    }

    fn matches(query: &SearchQuery, doc: &Value) -> bool {
        let service_ok = doc
            .get("service_id")
            .and_then(Value::as_str)
            .is_some_and(|s| s == query.service_id);
        let date_ok = doc
            .get("date")
            .and_then(Value::as_i64)
            .is_some_and(|ms| ms >= query.start_ms && ms <= query.end_ms);
        service_ok && date_ok
    }
}

fn take_failure(counter: &mut u32, what: &str) -> SearchResult<()> {
    if *counter > 0 {
        *counter -= 1;
        return Err(SearchError::Transient(format!("injected {what} failure")));
    }
    Ok(())
}

#[async_trait]
impl SearchBackend for InMemorySearch {
    async fn bulk_write(&self, docs: Vec<SearchDoc>) -> SearchResult<()> {
        let mut inner = self.inner.lock().unwrap();
        take_failure(&mut inner.failures.bulk, "bulk")?;
        if let Some((index, n)) = &mut inner.failures.index {
            if *n > 0 && docs.iter().any(|d| &d.index == index) {
                *n -= 1;
                return Err(SearchError::Transient(format!(
                    "injected bulk failure for index {index}"
                )));
            }
        }
        for doc in docs {
            if !doc.source.is_object() {
                return Err(SearchError::Rejected(format!(
                    "document for index {} is not a JSON object",
                    doc.index
                )));
            }
            inner.indices.entry(doc.index).or_default().push(doc.source);
        }
        Ok(())
    }

    async fn open_cursor(&self, query: SearchQuery, ttl: Duration) -> SearchResult<SearchPage> {
        if query.page_size == 0 {
            return Err(SearchError::Rejected("page_size must be positive".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        take_failure(&mut inner.failures.search, "search")?;

        // Snapshot matching documents, index order then insertion order.
        let mut hits = Vec::new();
        for name in &query.indices {
            if let Some(docs) = inner.indices.get(name) {
                hits.extend(docs.iter().filter(|d| Self::matches(&query, d)).cloned());
            }
        }

        let id = inner.next_cursor.to_string();
        inner.next_cursor += 1;
        let mut state = CursorState {
            hits,
            offset: 0,
            page_size: query.page_size,
            ttl,
            last_access: self.clock.now(),
        };
        let page_end = state.page_size.min(state.hits.len());
        let first: Vec<Value> = state.hits[..page_end].to_vec();
        state.offset = page_end;

        if state.offset >= state.hits.len() {
            // Single-page result, no cursor to keep alive.
            return Ok(SearchPage {
                hits: first,
                cursor: None,
            });
        }
        inner.cursors.insert(id.clone(), state);
        Ok(SearchPage {
            hits: first,
            cursor: Some(id),
        })
    }

    async fn next_page(&self, cursor: &CursorId) -> SearchResult<SearchPage> {
        let mut inner = self.inner.lock().unwrap();
        take_failure(&mut inner.failures.search, "search")?;
        let now = self.clock.now();

        let Some(state) = inner.cursors.get_mut(cursor) else {
            return Err(SearchError::CursorExpired(cursor.clone()));
        };
        let idle = now.signed_duration_since(state.last_access);
        if idle.to_std().unwrap_or_default() > state.ttl {
            inner.cursors.remove(cursor);
            return Err(SearchError::CursorExpired(cursor.clone()));
        }
        state.last_access = now;

        let page_end = (state.offset + state.page_size).min(state.hits.len());
        let hits: Vec<Value> = state.hits[state.offset..page_end].to_vec();
        state.offset = page_end;
        let exhausted = state.offset >= state.hits.len();
        if exhausted {
            inner.cursors.remove(cursor);
            return Ok(SearchPage { hits, cursor: None });
        }
        Ok(SearchPage {
            hits,
            cursor: Some(cursor.clone()),
        })
    }

    fn release_cursor(&self, cursor: &CursorId) {
        self.inner.lock().unwrap().cursors.remove(cursor);
    }

    async fn delete_by_index(&self, index: &str) -> SearchResult<()> {
        let mut inner = self.inner.lock().unwrap();
        take_failure(&mut inner.failures.delete, "delete")?;
        inner.indices.remove(index);
        Ok(())
    }

    async fn list_indices(&self, prefix: &str) -> SearchResult<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .indices
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }
}
