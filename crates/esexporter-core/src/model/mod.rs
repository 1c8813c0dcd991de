//! Typed records produced by one scrape.
//!
//! Every record deserializes with `#[serde(default)]`: a field the upstream
//! payload omits takes its type's zero value instead of failing the scrape.
//! String fields also accept an explicit `null` the same way.

mod cluster;
mod position;
mod projection;
mod server;
mod subscription;
mod tcp;

pub use cluster::{MemberState, MemberStats};
pub use position::{EventPosition, LogPosition, PositionParseError};
pub use projection::ProjectionStats;
pub use server::{
    DiskIoStats, DriveStats, EsStats, Features, ProcessStats, QueueStats, ServerInfo, ServerStats,
    SystemStats, TcpStats,
};
pub use subscription::{ParkedStats, SubscriptionStats};
pub use tcp::TcpConnectionStats;

use serde::{Deserialize, Deserializer};

pub(crate) use cluster::GossipEnvelope;
pub(crate) use projection::ProjectionsEnvelope;
pub(crate) use subscription::SubscriptionGroupInfo;

/// `null` deserializes as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Identifier of the global log spanning all streams.
pub const ALL_STREAM: &str = "$all";

/// Last position of one configured stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamStats {
    pub event_stream_id: String,
    pub last_position: LogPosition,
}

/// Point-in-time view of the upstream server, built by one scrape.
///
/// No consistency is guaranteed across categories: each was read
/// independently and concurrently.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub info: ServerInfo,
    pub server: ServerStats,
    /// Empty when cluster stats are disabled.
    pub cluster_members: Vec<MemberStats>,
    pub projections: Vec<ProjectionStats>,
    pub subscriptions: Vec<SubscriptionStats>,
    pub streams: Vec<StreamStats>,
    /// Empty when TCP connection stats are disabled.
    pub tcp_connections: Vec<TcpConnectionStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_strings_read_as_empty() {
        let subs: Vec<SubscriptionStats> = serde_json::from_str(
            r#"[{
                "eventStreamId": "orders",
                "groupName": "billing",
                "lastCheckpointedEventPosition": null,
                "lastKnownEventPosition": null,
                "connectionCount": 2
            }]"#,
        )
        .unwrap();
        assert_eq!(subs[0].group_name, "billing");
        assert_eq!(subs[0].last_checkpointed_event_position, "");
        assert_eq!(subs[0].connection_count, 2);

        let conns: Vec<TcpConnectionStats> = serde_json::from_str(
            r#"[{ "connectionId": "c0ffee", "clientConnectionName": null, "remoteEndPoint": null, "totalBytesSent": 10 }]"#,
        )
        .unwrap();
        assert_eq!(conns[0].connection_id, "c0ffee");
        assert_eq!(conns[0].client_connection_name, "");
        assert_eq!(conns[0].remote_endpoint, "");
        assert_eq!(conns[0].total_bytes_sent, 10);
    }

    #[test]
    fn test_null_version_and_state() {
        let info: ServerInfo =
            serde_json::from_str(r#"{ "esVersion": null, "state": null }"#).unwrap();
        assert_eq!(info, ServerInfo::default());
    }
}
