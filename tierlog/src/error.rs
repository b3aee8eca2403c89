//! Error types for the tiered log store.

use chrono::{DateTime, Utc};
use common::SearchError;

/// Errors surfaced by the tiered store.
///
/// Transient backend errors are retried inside the tier adapters and
/// only show up here once the retry budget is exhausted.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad input; never retried.
    #[error("invalid record: {0}")]
    Validation(String),

    /// Query range with start after end.
    #[error("invalid time range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The hot-tier cursor outlived its inactivity window. Hard
    /// failure: the caller must re-query from scratch.
    #[error("hot tier cursor expired")]
    CursorExpired,

    /// Hot-tier backend failure after retries.
    #[error("hot tier error: {0}")]
    HotTier(String),

    /// Cold-tier backend failure after retries.
    #[error("cold tier error: {0}")]
    ColdTier(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<SearchError> for Error {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::CursorExpired(_) => Error::CursorExpired,
            other => Error::HotTier(other.to_string()),
        }
    }
}

/// Callers that care about absence (`exists`, `get_partition`) match
/// `object_store::Error::NotFound` before converting.
impl From<object_store::Error> for Error {
    fn from(e: object_store::Error) -> Self {
        Error::ColdTier(e.to_string())
    }
}
