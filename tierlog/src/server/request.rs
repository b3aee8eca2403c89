//! HTTP request types for the log server.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// Path-segment date format, e.g. `2017-08-09-18-56-12`.
const PATH_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Body of an ingest request: a batch of raw log entries.
#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub logs: Vec<Value>,
}

impl IngestBody {
    /// Parses the request body. Anything other than a JSON object with
    /// a `logs` array is a validation failure.
    pub fn from_body(body: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(body)
            .map_err(|e| Error::Validation(format!("invalid request body: {e}")))
    }
}

/// Parses a path-segment timestamp into a UTC instant.
pub fn parse_path_date(raw: &str) -> Result<DateTime<Utc>, Error> {
    NaiveDateTime::parse_from_str(raw, PATH_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| {
            Error::Validation(format!(
                "invalid date {raw}, expected {PATH_DATE_FORMAT}"
            ))
        })
}
