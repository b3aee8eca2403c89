//! Prometheus metrics for the log server.

use axum::http::Method;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// Labels for HTTP request metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabelsWithStatus {
    pub method: HttpMethod,
    pub endpoint: String,
    pub status: u16,
}

/// HTTP method label value.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Other,
}

impl From<&Method> for HttpMethod {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => HttpMethod::Get,
            Method::POST => HttpMethod::Post,
            Method::PUT => HttpMethod::Put,
            Method::DELETE => HttpMethod::Delete,
            Method::PATCH => HttpMethod::Patch,
            Method::HEAD => HttpMethod::Head,
            Method::OPTIONS => HttpMethod::Options,
            _ => HttpMethod::Other,
        }
    }
}

/// Labels for HTTP request latency histogram (without status, since status is unknown at start).
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: HttpMethod,
    pub endpoint: String,
}

/// Container for all Prometheus metrics.
pub struct Metrics {
    registry: Registry,

    /// Counter of records accepted through ingest.
    pub ingest_records_total: Counter,

    /// Counter of query streams opened.
    pub query_requests_total: Counter,

    /// Counter of partitions migrated to the cold tier.
    pub archive_partitions_archived_total: Counter,

    /// Counter of partitions skipped because their cold object existed.
    pub archive_partitions_skipped_total: Counter,

    /// Counter of partitions whose migration failed and will retry.
    pub archive_partitions_failed_total: Counter,

    /// Counter of HTTP requests.
    pub http_requests_total: Family<HttpLabelsWithStatus, Counter>,

    /// Histogram of HTTP request latency in seconds.
    pub http_request_duration_seconds: Family<HttpLabels, Histogram>,

    /// Gauge of currently in-flight requests.
    pub http_requests_in_flight: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics registry with all metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let ingest_records_total = Counter::default();
        registry.register(
            "ingest_records_total",
            "Total number of records accepted through ingest",
            ingest_records_total.clone(),
        );

        let query_requests_total = Counter::default();
        registry.register(
            "query_requests_total",
            "Total number of query streams opened",
            query_requests_total.clone(),
        );

        let archive_partitions_archived_total = Counter::default();
        registry.register(
            "archive_partitions_archived_total",
            "Total number of partitions migrated to the cold tier",
            archive_partitions_archived_total.clone(),
        );

        let archive_partitions_skipped_total = Counter::default();
        registry.register(
            "archive_partitions_skipped_total",
            "Total number of partitions skipped because already archived",
            archive_partitions_skipped_total.clone(),
        );

        let archive_partitions_failed_total = Counter::default();
        registry.register(
            "archive_partitions_failed_total",
            "Total number of partition migrations that failed",
            archive_partitions_failed_total.clone(),
        );

        let http_requests_total = Family::<HttpLabelsWithStatus, Counter>::default();
        registry.register(
            "http_requests_total",
            "Total number of HTTP requests",
            http_requests_total.clone(),
        );

        // Buckets from 1ms to ~8s
        let http_request_duration_seconds =
            Family::<HttpLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 14))
            });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
            http_request_duration_seconds.clone(),
        );

        let http_requests_in_flight = Gauge::default();
        registry.register(
            "http_requests_in_flight",
            "Number of HTTP requests currently being processed",
            http_requests_in_flight.clone(),
        );

        Self {
            registry,
            ingest_records_total,
            query_requests_total,
            archive_partitions_archived_total,
            archive_partitions_skipped_total,
            archive_partitions_failed_total,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
        }
    }

    /// Records one archival tick's outcome.
    pub fn observe_archive_tick(&self, summary: &crate::archive::ArchiveSummary) {
        self.archive_partitions_archived_total
            .inc_by(summary.archived as u64);
        self.archive_partitions_skipped_total
            .inc_by(summary.skipped as u64);
        self.archive_partitions_failed_total
            .inc_by(summary.failed as u64);
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding metrics should not fail");
        buffer
    }
}
