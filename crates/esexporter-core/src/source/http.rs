//! `SourceReader` over the server's HTTP API.
//!
//! Stats endpoints are read as plain JSON. Log reads go through the AtomPub
//! stream-browsing API (`/streams/{id}/...?embed=rich`), which servers from
//! 20.6 on ship disabled. `GrpcSource` covers those.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::{LogEntry, SourceReader, StreamMetadata};
use crate::deadline::Deadline;
use crate::error::SourceError;
use crate::model::{ALL_STREAM, LogPosition};

const JSON: &str = "application/json";
const ATOM_JSON: &str = "application/vnd.eventstore.atom+json";

/// Connection settings for [`HttpSource`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpSourceConfig {
    pub url: String,
    /// Basic credentials are sent only when both are non-empty.
    pub user: String,
    pub password: String,
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    base: Url,
    client: reqwest::Client,
    credentials: Option<(String, String)>,
}

impl HttpSource {
    pub fn new(config: &HttpSourceConfig) -> Result<Self, SourceError> {
        let base = Url::parse(&config.url)
            .map_err(|e| SourceError::Transport(format!("invalid url {}: {}", config.url, e)))?;
        if base.cannot_be_a_base() {
            return Err(SourceError::Transport(format!(
                "invalid url {}: cannot be a base",
                config.url
            )));
        }
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .map_err(|e| SourceError::Transport(format!("failed to build http client: {}", e)))?;
        let credentials = (!config.user.is_empty() && !config.password.is_empty())
            .then(|| (config.user.clone(), config.password.clone()));

        Ok(Self {
            base,
            client,
            credentials,
        })
    }

    fn url_for_path(&self, path: &str) -> Result<Url, SourceError> {
        let raw = format!("{}{}", self.base.as_str().trim_end_matches('/'), path);
        Url::parse(&raw).map_err(|e| SourceError::Transport(format!("invalid url {}: {}", raw, e)))
    }

    /// `{base}/streams/{log_id}/{rest...}`, each segment percent-encoded.
    fn stream_url(&self, log_id: &str, rest: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("streams").push(log_id).extend(rest);
        }
        url
    }

    async fn fetch(
        &self,
        url: Url,
        accept: &str,
        accept_not_found: bool,
        deadline: Deadline,
    ) -> Result<Option<Vec<u8>>, SourceError> {
        if deadline.is_expired() {
            return Err(SourceError::Timeout);
        }
        debug!(url = %url, "GET request to EventStore");

        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .timeout(deadline.remaining());
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(from_reqwest)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND && accept_not_found {
            return Ok(None);
        }
        if status.as_u16() >= 400 {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(from_reqwest)?;
        Ok(Some(body.to_vec()))
    }

    async fn read_feed(
        &self,
        url: Url,
        deadline: Deadline,
    ) -> Result<Option<AtomFeed>, SourceError> {
        let Some(body) = self.fetch(url, ATOM_JSON, true, deadline).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&body)?))
    }
}

fn from_reqwest(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Transport(e.to_string())
    }
}

#[async_trait]
impl SourceReader for HttpSource {
    async fn get(
        &self,
        path: &str,
        accept_not_found: bool,
        deadline: Deadline,
    ) -> Result<Option<Vec<u8>>, SourceError> {
        let url = self.url_for_path(path)?;
        self.fetch(url, JSON, accept_not_found, deadline).await
    }

    async fn read_backward(
        &self,
        log_id: &str,
        deadline: Deadline,
    ) -> Result<Option<LogEntry>, SourceError> {
        let mut url = self.stream_url(log_id, &["head", "backward", "1"]);
        url.set_query(Some("embed=rich"));
        let Some(feed) = self.read_feed(url, deadline).await? else {
            return Ok(None);
        };
        feed.last_entry(log_id == ALL_STREAM)
    }

    async fn read_forward(
        &self,
        log_id: &str,
        from: u64,
        deadline: Deadline,
    ) -> Result<Option<LogEntry>, SourceError> {
        let from = from.to_string();
        let mut url = self.stream_url(log_id, &[from.as_str(), "forward", "1"]);
        url.set_query(Some("embed=rich"));
        let Some(feed) = self.read_feed(url, deadline).await? else {
            return Ok(None);
        };
        feed.first_entry()
    }

    async fn read_metadata(
        &self,
        log_id: &str,
        deadline: Deadline,
    ) -> Result<Option<u64>, SourceError> {
        let url = self.stream_url(log_id, &["metadata"]);
        let Some(body) = self.fetch(url, JSON, true, deadline).await? else {
            return Ok(None);
        };
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let metadata: StreamMetadata = serde_json::from_slice(&body)?;
        Ok(metadata.truncate_before)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AtomFeed {
    /// `"<last event number>;<hash>"`
    e_tag: String,
    links: Vec<AtomLink>,
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AtomLink {
    uri: String,
    relation: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AtomEntry {
    updated: Option<DateTime<Utc>>,
    position_event_number: Option<u64>,
    event_number: Option<u64>,
}

impl AtomFeed {
    /// Head of a backward page. Regular streams take the event number from
    /// the eTag, `$all` takes the commit position from the `previous` link.
    fn last_entry(&self, all_stream: bool) -> Result<Option<LogEntry>, SourceError> {
        let Some(entry) = self.entries.first() else {
            return Ok(None);
        };
        let position = if all_stream {
            LogPosition::CommitPosition(self.previous_commit_position()?)
        } else {
            let from_etag = self
                .e_tag
                .split(';')
                .next()
                .and_then(|n| n.parse::<u64>().ok());
            match from_etag.or(entry.position_event_number) {
                Some(n) => LogPosition::EventNumber(n),
                None => {
                    return Err(SourceError::Decode(format!(
                        "cannot parse eTag {:?} on stream feed",
                        self.e_tag
                    )));
                }
            }
        };
        Ok(Some(LogEntry {
            position,
            created: entry.created()?,
        }))
    }

    fn first_entry(&self) -> Result<Option<LogEntry>, SourceError> {
        let Some(entry) = self.entries.first() else {
            return Ok(None);
        };
        let number = entry
            .position_event_number
            .or(entry.event_number)
            .ok_or_else(|| SourceError::Decode("entry without event number".to_string()))?;
        Ok(Some(LogEntry {
            position: LogPosition::EventNumber(number),
            created: entry.created()?,
        }))
    }

    /// `$all` links encode positions as 32 hex digits: commit then prepare.
    fn previous_commit_position(&self) -> Result<u64, SourceError> {
        self.links
            .iter()
            .filter(|l| l.relation == "previous")
            .flat_map(|l| l.uri.split('/'))
            .find(|segment| segment.len() == 32 && segment.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|segment| u64::from_str_radix(&segment[..16], 16).ok())
            .ok_or_else(|| SourceError::Decode("no position in $all feed links".to_string()))
    }
}

impl AtomEntry {
    fn created(&self) -> Result<DateTime<Utc>, SourceError> {
        self.updated
            .ok_or_else(|| SourceError::Decode("entry without updated timestamp".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str) -> HttpSource {
        HttpSource::new(&HttpSourceConfig {
            url: url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_stream_url_encodes_log_id() {
        let s = source("http://localhost:2113");
        let url = s.stream_url("$persistentsubscription-orders::billing-parked", &["metadata"]);
        assert_eq!(
            url.path(),
            "/streams/$persistentsubscription-orders::billing-parked/metadata"
        );

        let url = s.stream_url("with space", &["head", "backward", "1"]);
        assert_eq!(url.path(), "/streams/with%20space/head/backward/1");
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let s = source("http://proxy:8080/es/");
        assert_eq!(
            s.url_for_path("/stats").unwrap().as_str(),
            "http://proxy:8080/es/stats"
        );
        assert_eq!(
            s.stream_url("orders", &["metadata"]).path(),
            "/es/streams/orders/metadata"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = HttpSource::new(&HttpSourceConfig {
            url: "not a url".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, SourceError::Transport(_)));
    }

    #[test]
    fn test_credentials_require_both_parts() {
        let s = HttpSource::new(&HttpSourceConfig {
            url: "http://localhost:2113".to_string(),
            user: "admin".to_string(),
            password: String::new(),
            insecure_skip_verify: false,
        })
        .unwrap();
        assert!(s.credentials.is_none());
    }

    #[test]
    fn test_feed_head_from_etag() {
        let feed: AtomFeed = serde_json::from_str(
            r#"{
                "eTag": "59;-1296467268",
                "entries": [{ "updated": "2024-03-01T10:00:00.123456Z", "positionEventNumber": 58 }]
            }"#,
        )
        .unwrap();
        let entry = feed.last_entry(false).unwrap().unwrap();
        assert_eq!(entry.position, LogPosition::EventNumber(59));
        assert_eq!(entry.created.to_rfc3339(), "2024-03-01T10:00:00.123456+00:00");
    }

    #[test]
    fn test_feed_without_entries_is_empty() {
        let feed: AtomFeed = serde_json::from_str(r#"{ "eTag": "-1;0", "entries": [] }"#).unwrap();
        assert_eq!(feed.last_entry(false).unwrap(), None);
        assert_eq!(feed.first_entry().unwrap(), None);
    }

    #[test]
    fn test_all_feed_commit_position_from_links() {
        let feed: AtomFeed = serde_json::from_str(
            r#"{
                "links": [
                    { "uri": "http://es:2113/streams/%24all", "relation": "self" },
                    { "uri": "http://es:2113/streams/%24all/00000000000004D200000000000004D0/forward/1", "relation": "previous" }
                ],
                "entries": [{ "updated": "2024-03-01T10:00:00Z" }]
            }"#,
        )
        .unwrap();
        let entry = feed.last_entry(true).unwrap().unwrap();
        assert_eq!(entry.position, LogPosition::CommitPosition(1234));
    }

    #[test]
    fn test_entry_without_timestamp_is_decode_error() {
        let feed: AtomFeed =
            serde_json::from_str(r#"{ "entries": [{ "eventNumber": 3 }] }"#).unwrap();
        assert!(matches!(feed.first_entry(), Err(SourceError::Decode(_))));
    }

    #[test]
    fn test_metadata_truncate_before() {
        let meta: StreamMetadata = serde_json::from_str(r#"{ "$tb": 20, "$maxAge": 60 }"#).unwrap();
        assert_eq!(meta.truncate_before, Some(20));
        let meta: StreamMetadata = serde_json::from_str(r#"{ "$maxCount": 5 }"#).unwrap();
        assert_eq!(meta.truncate_before, None);
    }
}
