//! Scrape-time statistics collection.
//!
//! One call to [`StatsCollector::collect`] fans out to every category at once:
//! - `/info`: server identity and version
//! - `/stats`: process, drive and queue stats
//! - `/gossip`: cluster members (only with cluster stats enabled)
//! - `/projections/all-non-transient`: projections (404 means none)
//! - `/subscriptions`: persistent subscriptions, plus parked-message stats
//! - configured streams: last position of each
//! - `/stats/tcp`: client connections (only with TCP connection stats enabled)
//!
//! All branches share one [`Deadline`]. The first mandatory category to fail
//! fails the scrape and the remaining branches are dropped. Cluster and TCP
//! connection stats are optional: a failure there is logged and yields an
//! empty list.

mod cluster;
mod info;
mod projections;
mod server;
mod streams;
mod subscriptions;
mod tcp;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::debug;

use crate::deadline::Deadline;
use crate::error::{Category, CollectError, SourceError};
use crate::model::Snapshot;
use crate::source::SourceReader;

/// What to collect besides the mandatory categories.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    /// Read `/gossip`. Off for single-node deployments.
    pub cluster_stats: bool,
    pub tcp_connection_stats: bool,
    pub parked_messages_stats: bool,
    /// Streams whose last position is reported. `$all` is allowed.
    pub streams: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            cluster_stats: true,
            tcp_connection_stats: false,
            parked_messages_stats: false,
            streams: Vec::new(),
        }
    }
}

/// Builds a [`Snapshot`] per scrape. Holds no state between scrapes.
pub struct StatsCollector<S> {
    source: S,
    config: CollectorConfig,
}

impl<S: SourceReader> StatsCollector<S> {
    pub fn new(source: S, config: CollectorConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Collects every category concurrently.
    ///
    /// Fails with `CollectError::Timeout` if the deadline passes first. No
    /// partial snapshot is ever returned.
    pub async fn collect(&self, deadline: Deadline) -> Result<Snapshot, CollectError> {
        let started = Instant::now();
        debug!("scrape started");

        let result = match tokio::time::timeout_at(deadline.instant(), self.collect_all(deadline))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(CollectError::Timeout(started.elapsed())),
        };

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "scrape finished"
        );
        result
    }

    async fn collect_all(&self, deadline: Deadline) -> Result<Snapshot, CollectError> {
        // Shared so the parked strategy gate reuses the same `/info` read.
        let info = self.fetch_info(deadline).boxed().shared();

        let (info, server, cluster_members, projections, subscriptions, streams, tcp_connections) =
            tokio::try_join!(
                info.clone(),
                self.fetch_server_stats(deadline),
                self.fetch_cluster_members(deadline),
                self.fetch_projections(deadline),
                self.fetch_subscriptions(info.clone(), deadline),
                self.fetch_streams(deadline),
                self.fetch_tcp_connections(deadline),
            )?;

        Ok(Snapshot {
            info,
            server,
            cluster_members,
            projections,
            subscriptions,
            streams,
            tcp_connections,
        })
    }

    /// GETs `path` and decodes the body as JSON.
    ///
    /// `None` only when `accept_not_found` is set and the server answered 404.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        accept_not_found: bool,
        category: Category,
        deadline: Deadline,
    ) -> Result<Option<T>, CollectError> {
        let body = self
            .source
            .get(path, accept_not_found, deadline)
            .await
            .map_err(CollectError::category(category))?;
        body.map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(|e| CollectError::category(category)(SourceError::from(e)))
    }
}
