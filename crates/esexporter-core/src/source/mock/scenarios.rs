//! Pre-built mock server scenarios for testing.
//!
//! These scenarios provide realistic server states for exercising the
//! collector across server versions and deployment shapes.

use std::time::Duration;

use super::reader::{MockResponse, MockSource};
use crate::parked::parked_log_id;

const STATS: &str = r#"{
    "proc": {
        "cpu": 12.5,
        "mem": 268435456,
        "diskIo": { "readBytes": 4096, "writtenBytes": 8192, "readOps": 10, "writeOps": 20 },
        "tcp": { "sentBytesTotal": 1000, "receivedBytesTotal": 2000, "connections": 3 }
    },
    "sys": {
        "drive": {
            "/var/lib/eventstore": { "totalBytes": 107374182400, "availableBytes": 53687091200 }
        }
    },
    "es": {
        "queue": {
            "MainQueue": { "queueName": "MainQueue", "length": 0, "totalItemsProcessed": 1500 },
            "Subscriptions": { "queueName": "Subscriptions", "length": 2, "totalItemsProcessed": 300 }
        }
    }
}"#;

const SUBSCRIPTIONS: &str = r#"[
    {
        "eventStreamId": "orders",
        "groupName": "billing",
        "totalItemsProcessed": 60,
        "connectionCount": 1,
        "lastKnownEventNumber": 59,
        "lastProcessedEventNumber": 49,
        "totalInFlightMessages": 0
    },
    {
        "eventStreamId": "$all",
        "groupName": "audit",
        "totalItemsProcessed": 500,
        "connectionCount": 2,
        "lastCheckpointedEventPosition": "C:1000/P:1000",
        "lastKnownEventPosition": "C:2000/P:2000",
        "totalInFlightMessages": 4
    }
]"#;

const PROJECTIONS: &str = r#"{
    "projections": [
        { "effectiveName": "$by_category", "status": "Running", "progress": 100.0, "eventsProcessedAfterRestart": 60 },
        { "effectiveName": "$stream_by_category", "status": "Stopped", "progress": 0.0, "eventsProcessedAfterRestart": 0 },
        { "effectiveName": "order-totals", "status": "Faulted (Enabled)", "progress": 42.5, "eventsProcessedAfterRestart": 7 }
    ]
}"#;

const TCP_CONNECTIONS: &str = r#"[
    {
        "remoteEndPoint": "10.0.0.5:51234",
        "localEndPoint": "10.0.0.1:1113",
        "connectionId": "6d1b1c8e-1d4f-4b43-9a1d-3c6a2c7b9f10",
        "clientConnectionName": "orders-service",
        "totalBytesSent": 4096,
        "totalBytesReceived": 1024,
        "pendingSendBytes": 0,
        "pendingReceivedBytes": 0,
        "isExternalConnection": true,
        "isSslConnection": false
    }
]"#;

/// Parked messages in `orders::billing` for the scenarios that have any.
pub const PARKED_IN_BILLING: usize = 20;

impl MockSource {
    /// A current single node: AtomPub enabled, two subscriptions, three
    /// projections and two readable streams.
    ///
    /// `orders::billing` has 20 parked messages aged two minutes,
    /// `$all::audit` has none.
    pub fn single_node() -> Self {
        let mut source = Self::new();
        source.respond_json("/info", info_json("23.10.1", "leader"));
        source.respond_json("/stats", STATS);
        source.respond_json("/subscriptions", SUBSCRIPTIONS);
        source.respond_json("/projections/all-non-transient", PROJECTIONS);
        source.respond_json("/stats/tcp", TCP_CONNECTIONS);
        source.respond_json("/gossip", gossip_json(&["10.0.0.1"]));
        source.respond_json("/streams/$all/head/backward/1", r#"{ "entries": [] }"#);

        source.append_aged(
            &parked_log_id("orders", "billing"),
            PARKED_IN_BILLING,
            Duration::from_secs(120),
        );
        source.append_aged("orders", 60, Duration::from_secs(300));
        source.append_aged("$all", 1200, Duration::from_secs(300));
        source
    }

    /// Follower in a three-node cluster.
    pub fn cluster_follower() -> Self {
        let mut source = Self::single_node();
        source.respond_json("/info", info_json("23.10.1", "follower"));
        source.respond_json("/gossip", gossip_json(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]));
        source
    }

    /// Server without AtomPub that reports parked counts through group info.
    pub fn group_info_node() -> Self {
        let mut source = Self::single_node();
        source.respond_json("/info", info_json("22.10.0.0", "leader"));
        source.respond("/streams/$all/head/backward/1", MockResponse::NotFound);
        source.respond_json(
            "/subscriptions/orders/billing/info",
            r#"{ "eventStreamId": "orders", "groupName": "billing", "parkedMessageCount": 7 }"#,
        );
        source.respond_json(
            "/subscriptions/$all/audit/info",
            r#"{ "eventStreamId": "$all", "groupName": "audit", "parkedMessageCount": 0 }"#,
        );
        source
    }

    /// Old server without AtomPub and without parked counts in group info.
    pub fn legacy_node() -> Self {
        let mut source = Self::single_node();
        source.respond_json("/info", info_json("20.6.1.0", "leader"));
        source.respond("/streams/$all/head/backward/1", MockResponse::NotFound);
        source
    }

    /// Server with the projections subsystem disabled.
    pub fn without_projections() -> Self {
        let mut source = Self::single_node();
        source.respond("/projections/all-non-transient", MockResponse::NotFound);
        source
    }
}

fn info_json(version: &str, state: &str) -> String {
    format!(
        r#"{{ "esVersion": "{}", "state": "{}", "features": {{ "projections": true, "userManagement": true, "atomPub": true }} }}"#,
        version, state
    )
}

fn gossip_json(ips: &[&str]) -> String {
    let members: Vec<String> = ips
        .iter()
        .map(|ip| {
            format!(
                r#"{{ "httpEndPointIp": "{}", "httpEndPointPort": 2113, "isAlive": true }}"#,
                ip
            )
        })
        .collect();
    format!(r#"{{ "members": [{}] }}"#, members.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::Deadline;
    use crate::model::{LogPosition, ServerInfo};
    use crate::source::SourceReader;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_single_node_serves_info() {
        let source = MockSource::single_node();
        let body = source.get("/info", false, deadline()).await.unwrap().unwrap();
        let info: ServerInfo = serde_json::from_slice(&body).unwrap();
        assert_eq!(info.es_version.as_str(), "23.10.1");
        assert_eq!(info.member_state, "leader");
    }

    #[tokio::test]
    async fn test_single_node_parked_log() {
        let source = MockSource::single_node();
        let last = source
            .read_backward(&parked_log_id("orders", "billing"), deadline())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            last.position,
            LogPosition::EventNumber(PARKED_IN_BILLING as u64 - 1)
        );
        let empty = source
            .read_backward(&parked_log_id("$all", "audit"), deadline())
            .await
            .unwrap();
        assert!(empty.is_none());
    }

    #[tokio::test]
    async fn test_legacy_node_has_no_atom_pub() {
        let source = MockSource::legacy_node();
        let probe = source
            .get("/streams/$all/head/backward/1", true, deadline())
            .await
            .unwrap();
        assert!(probe.is_none());
    }

    #[test]
    fn test_gossip_json_lists_members() {
        let json = gossip_json(&["10.0.0.1", "10.0.0.2"]);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["members"].as_array().unwrap().len(), 2);
    }
}
