//! esexporter-core: scrape-time statistics collection for EventStoreDB.
//!
//! Provides:
//! - `source`: upstream access abstraction (`SourceReader`), HTTP, gRPC and mock implementations
//! - `collector`: per-category fetchers and the concurrent `StatsCollector`
//! - `parked`: parked-message estimation and the strategy gate
//! - `model`: typed records making up a `Snapshot`
//! - `version`: server version comparison
//! - `deadline`: absolute deadline threaded through one scrape
//!
//! With `exposition` feature (default):
//! - `exposition`: Prometheus text rendering of a snapshot
//!
//! With `grpc` feature (default):
//! - `source::GrpcSource`: log reads over the `esdb` gRPC client

pub mod collector;
pub mod deadline;
pub mod error;
pub mod model;
pub mod parked;
pub mod source;
pub mod version;

#[cfg(feature = "exposition")]
pub mod exposition;

pub use collector::{CollectorConfig, StatsCollector};
pub use deadline::Deadline;
pub use error::{Category, CollectError, SourceError};
pub use model::Snapshot;

/// Crate version, shared with the binary for `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
