//! Cluster gossip. Optional category.

use tracing::warn;

use super::StatsCollector;
use crate::deadline::Deadline;
use crate::error::{Category, CollectError};
use crate::model::{GossipEnvelope, MemberStats};
use crate::source::SourceReader;

impl<S: SourceReader> StatsCollector<S> {
    /// Empty without a network call when cluster stats are disabled.
    ///
    /// Failures other than the deadline expiring are logged and reported as
    /// no members.
    pub(crate) async fn fetch_cluster_members(
        &self,
        deadline: Deadline,
    ) -> Result<Vec<MemberStats>, CollectError> {
        if !self.config.cluster_stats {
            return Ok(Vec::new());
        }

        match self
            .get_json::<GossipEnvelope>("/gossip", false, Category::Cluster, deadline)
            .await
        {
            Ok(envelope) => Ok(envelope.map(|e| e.members).unwrap_or_default()),
            Err(e) if e.is_timeout() => Err(e),
            Err(e) => {
                warn!(error = %e, "cluster stats unavailable");
                Ok(Vec::new())
            }
        }
    }
}
