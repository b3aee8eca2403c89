//! Tierlog - a tiered log store.
//!
//! Tierlog ingests time-stamped log records per service, keeps recent
//! records in a fast indexing store (the hot tier) and periodically
//! migrates records older than a retention window into object storage
//! (the cold tier). Reads merge both tiers for any requested range and
//! stream results incrementally.
//!
//! # Architecture
//!
//! Records partition by `(service_id, UTC calendar day)`. Ingest
//! groups a batch by partition and bulk-writes each group to the hot
//! tier. An archival scheduler periodically drains every partition
//! older than the retention window through a cursor into one
//! newline-delimited object per partition, then retires the hot copy;
//! the cold write always completes before the hot delete, so
//! interruption duplicates records instead of losing them. Queries
//! stream the hot tier first, then each archived day in ascending
//! order, without global sorting or deduplication.
//!
//! # Key Concepts
//!
//! - **TieredStore**: the assembled store; the entry point for
//!   ingest, query and archival.
//! - **Partition**: the unit of storage and migration, derived from
//!   names present in either tier rather than persisted as metadata.
//! - **At-least-once**: migration and client retries may duplicate
//!   records; nothing deduplicates them.
//!
//! # Example
//!
//! ```ignore
//! use tierlog::{Config, TieredStore};
//!
//! let store = TieredStore::open(&Config::default())?;
//!
//! store.ingest("1", batch).await?;
//!
//! let mut stream = store.query("1", start, end).await?;
//! while let Some(record) = stream.next().await? {
//!     println!("{}: {}", record.timestamp, record.message);
//! }
//! ```

mod archive;
mod cold;
mod config;
mod error;
mod hot;
mod ingest;
mod model;
mod partition;
mod query;
#[cfg(feature = "http-server")]
pub mod server;
mod store;

pub use archive::{ArchiveSummary, ArchivalScheduler};
pub use cold::{ColdPartitionStream, ColdTier};
pub use config::Config;
pub use error::{Error, Result};
pub use hot::{HotCursor, HotTier};
pub use ingest::IngestWriter;
pub use model::LogRecord;
pub use partition::{PartitionId, day_bounds, days_touching, partition_key};
pub use query::{LogQueryStream, TieredQueryEngine};
pub use store::TieredStore;
