//! HTTP server for the tiered log store.

pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod metrics;
pub mod middleware;
pub mod request;
pub mod response;

pub use config::{CliArgs, ServerConfig};
pub use http::{LogServer, router};
pub use metrics::Metrics;
