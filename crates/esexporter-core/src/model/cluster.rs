//! Cluster gossip (`/gossip`).

use serde::Deserialize;

use super::null_as_default;

/// Member state of a cluster node, as reported by `/info`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberState {
    Leader,
    Follower,
    ReadOnlyReplica,
    Clone,
    Other,
}

impl MemberState {
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "leader" => MemberState::Leader,
            "follower" => MemberState::Follower,
            "readonlyreplica" => MemberState::ReadOnlyReplica,
            "clone" => MemberState::Clone,
            _ => MemberState::Other,
        }
    }
}

/// One member entry of the gossip envelope.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemberStats {
    #[serde(rename = "httpEndPointIp", deserialize_with = "null_as_default")]
    pub http_endpoint_ip: String,
    #[serde(rename = "httpEndPointPort")]
    pub http_endpoint_port: u16,
    pub is_alive: bool,
}

impl MemberStats {
    /// `ip:port` label identifying the member.
    pub fn name(&self) -> String {
        format!("{}:{}", self.http_endpoint_ip, self.http_endpoint_port)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct GossipEnvelope {
    pub members: Vec<MemberStats>,
}
