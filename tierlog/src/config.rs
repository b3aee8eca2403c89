//! Service configuration.
//!
//! Everything the core needs is injected from here: the retention
//! window, hot-tier paging and cursor lifetime, the archival cadence,
//! the retry budget and the backend selection. Loadable from YAML;
//! every field has a default so a partial file works.

use std::time::Duration;

use common::{ObjectStoreConfig, RetryPolicy, SearchConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Age, in whole days, after which a partition becomes eligible
    /// for archival.
    pub retention_days: u32,

    /// Hot-tier page size for cursor reads.
    pub page_size: usize,

    /// Hot-tier cursor inactivity window, in seconds. Pausing between
    /// pages longer than this fails the read with a cursor expiry.
    pub cursor_ttl_secs: u64,

    /// Interval between archival ticks, in seconds.
    pub archive_interval_secs: u64,

    /// Retry budget applied to every tier call.
    pub retry: RetryPolicy,

    /// Hot-tier backend.
    pub search: SearchConfig,

    /// Cold-tier backend.
    pub object_store: ObjectStoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retention_days: 10,
            page_size: 50,
            cursor_ttl_secs: 120,
            archive_interval_secs: 3_600,
            retry: RetryPolicy::default(),
            search: SearchConfig::default(),
            object_store: ObjectStoreConfig::default(),
        }
    }
}

impl Config {
    pub fn cursor_ttl(&self) -> Duration {
        Duration::from_secs(self.cursor_ttl_secs)
    }

    pub fn archive_interval(&self) -> Duration {
        Duration::from_secs(self.archive_interval_secs)
    }
}
