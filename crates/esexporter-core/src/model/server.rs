//! Server identity (`/info`) and process/system statistics (`/stats`).

use std::collections::BTreeMap;

use serde::Deserialize;

use super::null_as_default;
use crate::version::ServerVersion;

/// Server identity.
///
/// Source: `GET /info`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub es_version: ServerVersion,
    /// Cluster member state of the node answering the scrape.
    #[serde(rename = "state", deserialize_with = "null_as_default")]
    pub member_state: String,
    pub features: Features,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Features {
    pub projections: bool,
    pub user_management: bool,
    pub atom_pub: bool,
}

/// Source: `GET /stats`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerStats {
    #[serde(rename = "proc")]
    pub process: ProcessStats,
    #[serde(rename = "sys")]
    pub system: SystemStats,
    pub es: EsStats,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessStats {
    /// CPU usage in percent of one core (100 = one core fully busy).
    pub cpu: f64,
    #[serde(rename = "mem")]
    pub memory_bytes: i64,
    pub disk_io: DiskIoStats,
    pub tcp: TcpStats,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiskIoStats {
    pub read_bytes: i64,
    pub written_bytes: i64,
    pub read_ops: i64,
    pub write_ops: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TcpStats {
    #[serde(rename = "sentBytesTotal")]
    pub sent_bytes: i64,
    #[serde(rename = "receivedBytesTotal")]
    pub received_bytes: i64,
    pub connections: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemStats {
    /// Keyed by drive path.
    #[serde(rename = "drive")]
    pub drives: BTreeMap<String, DriveStats>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DriveStats {
    pub total_bytes: i64,
    pub available_bytes: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EsStats {
    #[serde(rename = "queue")]
    pub queues: BTreeMap<String, QueueStats>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueStats {
    #[serde(deserialize_with = "null_as_default")]
    pub queue_name: String,
    pub length: i64,
    #[serde(rename = "totalItemsProcessed")]
    pub items_processed: i64,
}
