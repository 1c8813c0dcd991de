//! TCP connection statistics. Optional category.

use tracing::warn;

use super::StatsCollector;
use crate::deadline::Deadline;
use crate::error::{Category, CollectError};
use crate::model::TcpConnectionStats;
use crate::source::SourceReader;

impl<S: SourceReader> StatsCollector<S> {
    pub(crate) async fn fetch_tcp_connections(
        &self,
        deadline: Deadline,
    ) -> Result<Vec<TcpConnectionStats>, CollectError> {
        if !self.config.tcp_connection_stats {
            return Ok(Vec::new());
        }

        match self
            .get_json::<Vec<TcpConnectionStats>>(
                "/stats/tcp",
                false,
                Category::TcpConnections,
                deadline,
            )
            .await
        {
            Ok(connections) => Ok(connections.unwrap_or_default()),
            Err(e) if e.is_timeout() => Err(e),
            Err(e) => {
                warn!(error = %e, "tcp connection stats unavailable");
                Ok(Vec::new())
            }
        }
    }
}
