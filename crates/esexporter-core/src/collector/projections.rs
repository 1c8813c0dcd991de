//! Projection statistics.
//!
//! A server started without projections answers 404, reported as no
//! projections.

use super::StatsCollector;
use crate::deadline::Deadline;
use crate::error::{Category, CollectError};
use crate::model::{ProjectionStats, ProjectionsEnvelope};
use crate::source::SourceReader;

impl<S: SourceReader> StatsCollector<S> {
    pub(crate) async fn fetch_projections(
        &self,
        deadline: Deadline,
    ) -> Result<Vec<ProjectionStats>, CollectError> {
        let envelope = self
            .get_json::<ProjectionsEnvelope>(
                "/projections/all-non-transient",
                true,
                Category::Projections,
                deadline,
            )
            .await?;
        Ok(envelope.map(|e| e.projections).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::collector::CollectorConfig;
    use crate::source::{MockResponse, MockSource};

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_projections_not_found_is_empty() {
        let collector =
            StatsCollector::new(MockSource::without_projections(), CollectorConfig::default());
        let projections = collector.fetch_projections(deadline()).await.unwrap();
        assert!(projections.is_empty());
    }

    #[tokio::test]
    async fn test_projections_server_error_is_hard() {
        let mut source = MockSource::single_node();
        source.respond("/projections/all-non-transient", MockResponse::Status(503));
        let collector = StatsCollector::new(source, CollectorConfig::default());

        let err = collector.fetch_projections(deadline()).await.unwrap_err();
        assert!(matches!(
            err,
            CollectError::Category {
                category: Category::Projections,
                ..
            }
        ));
    }
}
