//! The assembled store: both tier adapters plus the write, read and
//! archival components wired to one configuration.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Clock, SystemClock, create_object_store, create_search_backend};
use serde_json::Value;

use crate::archive::{ArchiveSummary, ArchivalScheduler};
use crate::cold::ColdTier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::hot::HotTier;
use crate::ingest::IngestWriter;
use crate::query::{LogQueryStream, TieredQueryEngine};

/// One process-wide handle over the tiered log store.
///
/// Cheap to share behind an `Arc`; every operation takes `&self`.
pub struct TieredStore {
    ingest: IngestWriter,
    query: TieredQueryEngine,
    archival: ArchivalScheduler,
}

impl TieredStore {
    /// Builds the store from configuration, with backends created by
    /// the config factories and the system clock.
    pub fn open(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let search = create_search_backend(&config.search, clock.clone());
        let store = create_object_store(&config.object_store)
            .map_err(|e| Error::ColdTier(e.to_string()))?;
        Ok(Self::with_backends(config, search, store, clock))
    }

    /// Builds the store over caller-supplied backends. Tests use this
    /// with in-memory backends and a mock clock.
    pub fn with_backends(
        config: &Config,
        search: Arc<dyn common::SearchBackend>,
        store: Arc<dyn object_store::ObjectStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let hot = Arc::new(HotTier::new(
            search,
            config.page_size,
            config.cursor_ttl(),
            config.retry.clone(),
        ));
        let cold = Arc::new(ColdTier::new(store, config.retry.clone()));
        Self {
            ingest: IngestWriter::new(
                hot.clone(),
                cold.clone(),
                clock.clone(),
                config.retention_days,
            ),
            query: TieredQueryEngine::new(
                hot.clone(),
                cold.clone(),
                clock.clone(),
                config.retention_days,
            ),
            archival: ArchivalScheduler::new(hot, cold, clock, config.retention_days),
        }
    }

    /// Ingests a batch of raw entries; returns the record count.
    pub async fn ingest(&self, service_id: &str, batch: Vec<Value>) -> Result<usize> {
        self.ingest.ingest(service_id, batch).await
    }

    /// Opens a merged stream over both tiers for the inclusive range.
    pub async fn query(
        &self,
        service_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<LogQueryStream> {
        self.query.query(service_id, start, end).await
    }

    /// Runs one archival tick.
    pub async fn run_archival(&self) -> Result<ArchiveSummary> {
        self.archival.run_once().await
    }
}
