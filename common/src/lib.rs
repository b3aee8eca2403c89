//! Shared building blocks for the tiered log service.
//!
//! This crate holds the pieces that are independent of the tiering
//! logic itself:
//!
//! - [`Clock`]: injectable time source, with a [`MockClock`] for tests
//!   that need to move across the retention boundary.
//! - [`SearchBackend`]: the primitives the hot tier is accessed
//!   through (bulk write, scrolled search, delete-by-query, index
//!   listing), plus an in-memory implementation.
//! - [`ObjectStoreConfig`] / [`create_object_store`]: cold-tier
//!   backend selection on top of the `object_store` crate.
//! - [`RetryPolicy`] / [`with_retry`]: bounded exponential backoff
//!   applied uniformly to tier calls.

pub mod clock;
pub mod object;
pub mod retry;
pub mod search;

pub use clock::{Clock, MockClock, SystemClock};
pub use object::{
    AwsObjectStoreConfig, LocalObjectStoreConfig, ObjectStoreConfig, create_object_store,
};
pub use retry::{RetryPolicy, with_retry};
pub use search::{
    CursorId, InMemorySearch, SearchBackend, SearchConfig, SearchDoc, SearchError, SearchPage,
    SearchQuery, SearchResult, create_search_backend,
};
