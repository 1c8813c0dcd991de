//! Last position of each configured stream.

use futures::future::join_all;

use super::StatsCollector;
use crate::deadline::Deadline;
use crate::error::{Category, CollectError, SourceError};
use crate::model::StreamStats;
use crate::source::SourceReader;

impl<S: SourceReader> StatsCollector<S> {
    /// Reads the head of every configured stream concurrently.
    ///
    /// Empty and missing streams are left out.
    pub(crate) async fn fetch_streams(
        &self,
        deadline: Deadline,
    ) -> Result<Vec<StreamStats>, CollectError> {
        let reads = self.config.streams.iter().map(|id| async move {
            let last = self.source.read_backward(id, deadline).await?;
            Ok::<_, SourceError>(last.map(|entry| StreamStats {
                event_stream_id: id.clone(),
                last_position: entry.position,
            }))
        });

        let mut streams = Vec::with_capacity(self.config.streams.len());
        for result in join_all(reads).await {
            if let Some(stats) = result.map_err(CollectError::category(Category::Streams))? {
                streams.push(stats);
            }
        }
        Ok(streams)
    }
}
