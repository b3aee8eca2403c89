//! Archival: migrates expired partitions from the hot tier to the
//! cold tier.
//!
//! Each tick walks every hot partition older than the retention
//! window and moves it in a fixed order: probe the cold tier, drain
//! the partition through a cursor into the partition's object, then
//! retire the hot copy. The cold write always completes before the
//! hot delete starts, so a crash in between leaves the partition in
//! both tiers rather than in neither. The duplicate window is resolved
//! on the next tick: an existing cold object short-circuits straight
//! to the hot delete.

use std::sync::Arc;

use chrono::Duration;
use common::Clock;
use tracing::{info, warn};

use crate::cold::ColdTier;
use crate::error::Result;
use crate::hot::HotTier;
use crate::partition::{PartitionId, day_bounds};

/// Outcome of one archival tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Partitions older than the retention window this tick.
    pub attempted: usize,
    /// Partitions fully migrated this tick.
    pub archived: usize,
    /// Partitions whose cold object already existed; only the hot
    /// retire was (re)done.
    pub skipped: usize,
    /// Partitions left for the next tick after an error.
    pub failed: usize,
}

/// Drives tier migration. One instance per process; ticks must not
/// overlap, which the caller's interval loop guarantees.
pub struct ArchivalScheduler {
    hot: Arc<HotTier>,
    cold: Arc<ColdTier>,
    clock: Arc<dyn Clock>,
    retention_days: u32,
}

impl ArchivalScheduler {
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

    /// Runs one full archival pass over every expired partition.
    ///
    /// Partition failures are logged and counted, never propagated;
    /// one wedged partition must not starve the rest. Only failure to
    /// enumerate partitions at all fails the tick.
    pub async fn run_once(&self) -> Result<ArchiveSummary> {
        let cutoff_day = (self.clock.now() - Duration::days(i64::from(self.retention_days)))
            .date_naive();
        let candidates: Vec<PartitionId> = self
            .hot
            .list_partitions()
            .await?
            .into_iter()
            .filter(|p| p.day < cutoff_day)
            .collect();

        let mut summary = ArchiveSummary {
            attempted: candidates.len(),
            ..Default::default()
        };
        for partition in &candidates {
            match self.archive_partition(partition).await {
                Ok(Outcome::Archived(records)) => {
                    info!(partition = %partition, records, "archived partition");
                    summary.archived += 1;
                }
                Ok(Outcome::AlreadyArchived) => {
                    info!(partition = %partition, "partition already archived, retired hot copy");
                    summary.skipped += 1;
                }
                Err(e) => {
                    warn!(partition = %partition, error = %e, "archival failed, will retry next tick");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn archive_partition(&self, partition: &PartitionId) -> Result<Outcome> {
        if self.cold.exists(partition).await? {
            // A previous tick published but did not finish retiring.
            self.hot.delete_all(partition).await?;
            return Ok(Outcome::AlreadyArchived);
        }

        let (start, end) = day_bounds(partition.day);
        let mut cursor = self
            .hot
            .range_query(&partition.service_id, std::slice::from_ref(partition), start, end)
            .await?;
        let records = self.cold.put_partition_from(partition, &mut cursor).await?;

        // The object is durable from here on. A failed delete leaves a
        // duplicate, not a loss.
        self.hot.delete_all(partition).await?;
        Ok(Outcome::Archived(records))
    }
}

enum Outcome {
    Archived(u64),
    AlreadyArchived,
}
