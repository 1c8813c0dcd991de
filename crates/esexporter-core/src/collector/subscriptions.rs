//! Persistent subscription statistics and their parked-message backlog.
//!
//! The base list comes from `/subscriptions`. Parked stats are added per
//! subscription using one strategy chosen for the whole scrape:
//! - `LogReads`: estimate from the parked log (count and oldest age)
//! - `GroupInfo`: `parkedMessageCount` from the group info (count only)
//!
//! A failed estimate leaves that subscription's parked stats unavailable and
//! does not fail the fetch. Only the deadline expiring does.

use std::future::Future;

use futures::future::join_all;
use reqwest::Url;
use tracing::{debug, error, warn};

use super::StatsCollector;
use crate::deadline::Deadline;
use crate::error::{Category, CollectError, SourceError};
use crate::model::{ParkedStats, ServerInfo, SubscriptionGroupInfo, SubscriptionStats};
use crate::parked::{self, ParkedStrategy, select_strategy};
use crate::source::SourceReader;

impl<S: SourceReader> StatsCollector<S> {
    pub(crate) async fn fetch_subscriptions<F>(
        &self,
        info: F,
        deadline: Deadline,
    ) -> Result<Vec<SubscriptionStats>, CollectError>
    where
        F: Future<Output = Result<ServerInfo, CollectError>>,
    {
        let (subscriptions, strategy) = tokio::try_join!(
            self.get_json::<Vec<SubscriptionStats>>(
                "/subscriptions",
                false,
                Category::Subscriptions,
                deadline,
            ),
            self.resolve_parked_strategy(info, deadline),
        )?;
        let mut subscriptions = subscriptions.unwrap_or_default();

        let parked = match strategy {
            ParkedStrategy::Disabled | ParkedStrategy::Unsupported => return Ok(subscriptions),
            ParkedStrategy::LogReads => {
                join_all(subscriptions.iter().map(|sub| {
                    parked::estimate(&self.source, &sub.event_stream_id, &sub.group_name, deadline)
                }))
                .await
            }
            ParkedStrategy::GroupInfo => {
                join_all(
                    subscriptions
                        .iter()
                        .map(|sub| self.group_info_parked(sub, deadline)),
                )
                .await
            }
        };

        for (sub, result) in subscriptions.iter_mut().zip(parked) {
            sub.parked = match result {
                Ok(stats) => stats,
                Err(SourceError::Timeout) => {
                    return Err(CollectError::Category {
                        category: Category::Subscriptions,
                        error: SourceError::Timeout,
                    });
                }
                Err(e) => {
                    warn!(
                        stream = %sub.event_stream_id,
                        group = %sub.group_name,
                        error = %e,
                        "parked message stats unavailable"
                    );
                    ParkedStats::UNAVAILABLE
                }
            };
        }
        Ok(subscriptions)
    }

    async fn resolve_parked_strategy<F>(
        &self,
        info: F,
        deadline: Deadline,
    ) -> Result<ParkedStrategy, CollectError>
    where
        F: Future<Output = Result<ServerInfo, CollectError>>,
    {
        if !self.config.parked_messages_stats {
            return Ok(ParkedStrategy::Disabled);
        }

        let log_reads = async {
            self.source
                .log_reads_available(deadline)
                .await
                .map_err(CollectError::category(Category::Subscriptions))
        };
        let (info, log_reads) = tokio::try_join!(info, log_reads)?;

        let strategy = select_strategy(true, log_reads, &info.es_version);
        if strategy == ParkedStrategy::Unsupported {
            error!(
                version = %info.es_version,
                "parked message stats need log reads (gRPC or AtomPub) or a server of at least 21.2.0.0"
            );
        } else {
            debug!(
                strategy = %strategy,
                version = %info.es_version,
                "parked message strategy selected"
            );
        }
        Ok(strategy)
    }

    async fn group_info_parked(
        &self,
        sub: &SubscriptionStats,
        deadline: Deadline,
    ) -> Result<ParkedStats, SourceError> {
        let path = group_info_path(&sub.event_stream_id, &sub.group_name)?;
        // 404: the group went away since the list was read, nothing parked.
        let info: SubscriptionGroupInfo = match self.source.get(&path, true, deadline).await? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => SubscriptionGroupInfo::default(),
        };
        Ok(ParkedStats {
            count: Some(info.parked_message_count.max(0) as u64),
            oldest_age_seconds: None,
        })
    }
}

/// `/subscriptions/{stream}/{group}/info`, each segment percent-encoded.
fn group_info_path(stream: &str, group: &str) -> Result<String, SourceError> {
    let mut url =
        Url::parse("http://localhost/").map_err(|e| SourceError::Transport(e.to_string()))?;
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().extend(["subscriptions", stream, group, "info"]);
    }
    Ok(url.path().to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::collector::CollectorConfig;
    use crate::source::{ATOM_PUB_PROBE, MockResponse, MockSource, PARKED_IN_BILLING};

    fn parked_enabled() -> CollectorConfig {
        CollectorConfig {
            parked_messages_stats: true,
            ..Default::default()
        }
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(10))
    }

    async fn fetch(source: MockSource, config: CollectorConfig) -> Vec<SubscriptionStats> {
        let collector = StatsCollector::new(source, config);
        let info = collector.fetch_info(deadline());
        collector.fetch_subscriptions(info, deadline()).await.unwrap()
    }

    #[tokio::test]
    async fn test_disabled_leaves_parked_unavailable() {
        let source = MockSource::single_node();
        let collector = StatsCollector::new(source, CollectorConfig::default());
        let info = collector.fetch_info(deadline());
        let subs = collector.fetch_subscriptions(info, deadline()).await.unwrap();

        assert!(subs.iter().all(|s| s.parked == ParkedStats::UNAVAILABLE));
        assert!(
            !collector
                .source()
                .calls()
                .iter()
                .any(|c| c.contains("parked") || c.contains("head/backward"))
        );
    }

    #[tokio::test]
    async fn test_log_reads_strategy() {
        let subs = fetch(MockSource::single_node(), parked_enabled()).await;
        assert_eq!(subs[0].parked.count, Some(PARKED_IN_BILLING as u64));
        assert!(subs[0].parked.oldest_age_seconds.is_some());
        assert_eq!(subs[1].parked, ParkedStats::empty());
    }

    #[tokio::test]
    async fn test_group_info_strategy() {
        let subs = fetch(MockSource::group_info_node(), parked_enabled()).await;
        assert_eq!(
            subs[0].parked,
            ParkedStats {
                count: Some(7),
                oldest_age_seconds: None,
            }
        );
        assert_eq!(subs[1].parked.count, Some(0));
    }

    #[tokio::test]
    async fn test_group_info_uses_subscription_stream() {
        let collector = StatsCollector::new(MockSource::group_info_node(), parked_enabled());
        let info = collector.fetch_info(deadline());
        collector.fetch_subscriptions(info, deadline()).await.unwrap();

        let source = collector.source();
        assert_eq!(source.call_count("GET /subscriptions/orders/billing/info"), 1);
        assert_eq!(source.call_count("GET /subscriptions/$all/audit/info"), 1);
        assert!(!source.calls().iter().any(|c| c.starts_with("backward")));
    }

    #[tokio::test]
    async fn test_group_info_failure_is_isolated() {
        let mut source = MockSource::group_info_node();
        source.respond("/subscriptions/orders/billing/info", MockResponse::Status(500));
        let subs = fetch(source, parked_enabled()).await;

        assert_eq!(subs[0].parked, ParkedStats::UNAVAILABLE);
        assert_eq!(subs[1].parked.count, Some(0));
    }

    #[tokio::test]
    async fn test_unsupported_server_leaves_parked_unavailable() {
        let collector = StatsCollector::new(MockSource::legacy_node(), parked_enabled());
        let info = collector.fetch_info(deadline());
        let subs = collector.fetch_subscriptions(info, deadline()).await.unwrap();

        assert!(subs.iter().all(|s| s.parked == ParkedStats::UNAVAILABLE));
        assert!(!collector.source().calls().iter().any(|c| c.contains("-parked")));
    }

    #[tokio::test]
    async fn test_log_reads_check_error_fails_fetch() {
        let mut source = MockSource::single_node();
        source.respond(ATOM_PUB_PROBE, MockResponse::Status(401));
        let collector = StatsCollector::new(source, parked_enabled());
        let info = collector.fetch_info(deadline());

        let err = collector.fetch_subscriptions(info, deadline()).await.unwrap_err();
        assert!(matches!(
            err,
            CollectError::Category {
                category: Category::Subscriptions,
                error: SourceError::Status { status: 401, .. },
            }
        ));
    }

    #[tokio::test]
    async fn test_no_subscriptions() {
        let mut source = MockSource::single_node();
        source.respond_json("/subscriptions", "[]");
        let subs = fetch(source, parked_enabled()).await;
        assert!(subs.is_empty());
    }

    #[test]
    fn test_group_info_path_encodes_segments() {
        assert_eq!(
            group_info_path("orders", "billing").unwrap(),
            "/subscriptions/orders/billing/info"
        );
        assert_eq!(
            group_info_path("my orders", "team/billing?v=1").unwrap(),
            "/subscriptions/my%20orders/team%2Fbilling%3Fv=1/info"
        );
        assert_eq!(
            group_info_path("$all", "audit").unwrap(),
            "/subscriptions/$all/audit/info"
        );
    }

    #[tokio::test]
    async fn test_group_info_requested_with_encoded_names() {
        let mut source = MockSource::group_info_node();
        source.respond_json(
            "/subscriptions",
            r#"[{ "eventStreamId": "my orders", "groupName": "billing" }]"#,
        );
        source.respond_json(
            "/subscriptions/my%20orders/billing/info",
            r#"{ "parkedMessageCount": 3 }"#,
        );
        let subs = fetch(source, parked_enabled()).await;
        assert_eq!(subs[0].parked.count, Some(3));
    }

    #[tokio::test]
    async fn test_group_info_not_found_means_nothing_parked() {
        let mut source = MockSource::group_info_node();
        source.respond("/subscriptions/orders/billing/info", MockResponse::NotFound);
        let subs = fetch(source, parked_enabled()).await;
        assert_eq!(
            subs[0].parked,
            ParkedStats {
                count: Some(0),
                oldest_age_seconds: None,
            }
        );
    }
}
