use serde::Deserialize;

use super::null_as_default;

/// One client connection as listed by `GET /stats/tcp`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TcpConnectionStats {
    #[serde(rename = "remoteEndPoint", deserialize_with = "null_as_default")]
    pub remote_endpoint: String,
    #[serde(rename = "localEndPoint", deserialize_with = "null_as_default")]
    pub local_endpoint: String,
    #[serde(deserialize_with = "null_as_default")]
    pub connection_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub client_connection_name: String,
    pub total_bytes_sent: i64,
    pub total_bytes_received: i64,
    pub pending_send_bytes: i64,
    pub pending_received_bytes: i64,
    #[serde(rename = "isExternalConnection")]
    pub external: bool,
    #[serde(rename = "isSslConnection")]
    pub ssl: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_list_parses() {
        let conns: Vec<TcpConnectionStats> = serde_json::from_str(
            r#"[{
                "remoteEndPoint": "10.0.0.5:51234",
                "localEndPoint": "10.0.0.1:1113",
                "connectionId": "c0ffee",
                "clientConnectionName": "orders-service",
                "totalBytesSent": 1024,
                "totalBytesReceived": 2048,
                "pendingSendBytes": 3,
                "isExternalConnection": true
            }]"#,
        )
        .unwrap();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].client_connection_name, "orders-service");
        assert_eq!(conns[0].pending_received_bytes, 0);
        assert!(conns[0].external);
        assert!(!conns[0].ssl);
    }
}
