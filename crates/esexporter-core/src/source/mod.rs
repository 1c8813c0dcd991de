//! Access to the upstream server.
//!
//! The `SourceReader` trait lets the collector run against the real server,
//! over HTTP alone or with log reads over gRPC, or against an in-memory mock
//! in tests.
//!
//! ```text
//!              ┌──────────────────┐
//!              │  StatsCollector  │
//!              └────────┬─────────┘
//!                ┌──────▼───────┐
//!                │ SourceReader │ (trait)
//!                └──────┬───────┘
//!        ┌─────────────┬──────┴──────┬─────────────┐
//!  ┌─────▼──────┐ ┌────▼───────┐ ┌───▼────────┐ ┌──▼─────────┐
//!  │ HttpSource │ │ GrpcSource │ │ MockSource │ │ Scenarios  │
//!  │ (reqwest)  │ │ (esdb)     │ │ (Testing)  │ │ (Fixtures) │
//!  └────────────┘ └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! Every call takes the scrape [`Deadline`] and must give up once it passes.
//! "Not there" is `Ok(None)`, never an error.

#[cfg(feature = "grpc")]
mod grpc;
mod http;
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::deadline::Deadline;
use crate::error::SourceError;
use crate::model::LogPosition;

#[cfg(feature = "grpc")]
pub use grpc::GrpcSource;
pub use http::{HttpSource, HttpSourceConfig};
pub use mock::{MockResponse, MockSource, PARKED_IN_BILLING, ReadKind};

/// Head of `$all` over AtomPub. Answers 404 where the AtomPub API is off.
pub const ATOM_PUB_PROBE: &str = "/streams/$all/head/backward/1";

/// A single entry read from a log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub position: LogPosition,
    pub created: DateTime<Utc>,
}

/// Abstraction over reads against the upstream server.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// GETs `path` (relative to the server root) and returns the raw body.
    ///
    /// With `accept_not_found`, a 404 yields `Ok(None)` instead of an error.
    async fn get(
        &self,
        path: &str,
        accept_not_found: bool,
        deadline: Deadline,
    ) -> Result<Option<Vec<u8>>, SourceError>;

    /// Most recent entry of `log_id`, `None` if the log is empty or missing.
    async fn read_backward(
        &self,
        log_id: &str,
        deadline: Deadline,
    ) -> Result<Option<LogEntry>, SourceError>;

    /// First retained entry at or after index `from`, `None` at end of data.
    async fn read_forward(
        &self,
        log_id: &str,
        from: u64,
        deadline: Deadline,
    ) -> Result<Option<LogEntry>, SourceError>;

    /// Truncation marker (`$tb`) from the log's metadata, `None` if the log
    /// has no metadata or the metadata carries no marker.
    async fn read_metadata(
        &self,
        log_id: &str,
        deadline: Deadline,
    ) -> Result<Option<u64>, SourceError>;

    /// Whether `read_backward` and `read_forward` work against this server.
    async fn log_reads_available(&self, deadline: Deadline) -> Result<bool, SourceError> {
        Ok(self.get(ATOM_PUB_PROBE, true, deadline).await?.is_some())
    }
}

/// Stream metadata document. Only the truncation marker is read.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StreamMetadata {
    #[serde(rename = "$tb")]
    pub(crate) truncate_before: Option<u64>,
}
