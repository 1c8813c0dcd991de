//! Process, drive and queue statistics.

use super::StatsCollector;
use crate::deadline::Deadline;
use crate::error::{Category, CollectError};
use crate::model::ServerStats;
use crate::source::SourceReader;

impl<S: SourceReader> StatsCollector<S> {
    pub(crate) async fn fetch_server_stats(
        &self,
        deadline: Deadline,
    ) -> Result<ServerStats, CollectError> {
        let stats = self
            .get_json::<ServerStats>("/stats", false, Category::Server, deadline)
            .await?
            .unwrap_or_default();
        Ok(stats)
    }
}
