//! `SourceReader` with log reads over gRPC.
//!
//! Stats endpoints still go through [`HttpSource`]. Stream and metadata reads
//! use the `esdb` client, which works whether or not the AtomPub API is
//! enabled on the server.

use std::future::Future;

use async_trait::async_trait;
use eventstore::{
    Client, ClientSettings, ReadAllOptions, ReadStream, ReadStreamOptions, RecordedEvent,
    StreamPosition,
};
use reqwest::Url;
use tracing::debug;

use super::{HttpSource, HttpSourceConfig, LogEntry, SourceReader, StreamMetadata};
use crate::deadline::Deadline;
use crate::error::SourceError;
use crate::model::{ALL_STREAM, LogPosition};

pub struct GrpcSource {
    http: HttpSource,
    client: Client,
}

impl GrpcSource {
    /// Must be called inside a tokio runtime.
    pub fn new(config: &HttpSourceConfig) -> Result<Self, SourceError> {
        let http = HttpSource::new(config)?;
        let settings: ClientSettings = connection_string(config)?
            .parse()
            .map_err(|e| SourceError::Transport(format!("invalid grpc settings: {}", e)))?;
        let client = Client::new(settings)
            .map_err(|e| SourceError::Transport(format!("failed to build grpc client: {}", e)))?;
        Ok(Self { http, client })
    }

    async fn read_one(
        &self,
        log_id: &str,
        options: ReadStreamOptions,
        deadline: Deadline,
    ) -> Result<Option<RecordedEvent>, SourceError> {
        debug!(log_id, "gRPC read from EventStore");
        within(deadline, async {
            let stream = self.client.read_stream(log_id, &options).await;
            first_event(stream).await
        })
        .await
    }

    async fn read_all_head(&self, deadline: Deadline) -> Result<Option<LogEntry>, SourceError> {
        debug!("gRPC read of $all head from EventStore");
        let options = ReadAllOptions::default()
            .position(StreamPosition::End)
            .backwards()
            .max_count(1);
        let event = within(deadline, async {
            let stream = self.client.read_all(&options).await;
            first_event(stream).await
        })
        .await?;
        Ok(event.map(|e| LogEntry {
            position: LogPosition::CommitPosition(e.position.commit),
            created: e.created,
        }))
    }
}

/// `esdb://` connection string for the host of the HTTP url. TLS follows the
/// url scheme.
fn connection_string(config: &HttpSourceConfig) -> Result<String, SourceError> {
    let http = Url::parse(&config.url)
        .map_err(|e| SourceError::Transport(format!("invalid url {}: {}", config.url, e)))?;
    let host = http
        .host_str()
        .ok_or_else(|| SourceError::Transport(format!("invalid url {}: no host", config.url)))?;
    let authority = match http.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let mut esdb = Url::parse(&format!("esdb://{}", authority))
        .map_err(|e| SourceError::Transport(format!("invalid grpc address {}: {}", authority, e)))?;
    if !config.user.is_empty() && !config.password.is_empty() {
        // Only fails for urls without a host, ruled out above.
        let _ = esdb.set_username(&config.user);
        let _ = esdb.set_password(Some(&config.password));
    }
    esdb.query_pairs_mut()
        .append_pair("tls", if http.scheme() == "https" { "true" } else { "false" })
        .append_pair(
            "tlsVerifyCert",
            if config.insecure_skip_verify { "false" } else { "true" },
        );
    Ok(esdb.to_string())
}

async fn within<T, F>(deadline: Deadline, read: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    if deadline.is_expired() {
        return Err(SourceError::Timeout);
    }
    tokio::time::timeout_at(deadline.instant(), read)
        .await
        .unwrap_or(Err(SourceError::Timeout))
}

/// First event of a read, `None` when the stream is empty or missing.
async fn first_event(
    stream: Result<ReadStream, eventstore::Error>,
) -> Result<Option<RecordedEvent>, SourceError> {
    let mut stream = match stream {
        Ok(stream) => stream,
        Err(eventstore::Error::ResourceNotFound) => return Ok(None),
        Err(e) => return Err(from_esdb(e)),
    };
    match stream.next().await {
        Ok(event) => Ok(event.map(|e| {
            e.link
                .or(e.event)
                .expect("[get_original_event] Not supposed to happen!")
        })),
        Err(eventstore::Error::ResourceNotFound) => Ok(None),
        Err(e) => Err(from_esdb(e)),
    }
}

fn from_esdb(e: eventstore::Error) -> SourceError {
    match e {
        eventstore::Error::DeadlineExceeded => SourceError::Timeout,
        other => SourceError::Transport(other.to_string()),
    }
}

fn entry(event: RecordedEvent) -> LogEntry {
    LogEntry {
        position: LogPosition::EventNumber(event.revision),
        created: event.created,
    }
}

#[async_trait]
impl SourceReader for GrpcSource {
    async fn get(
        &self,
        path: &str,
        accept_not_found: bool,
        deadline: Deadline,
    ) -> Result<Option<Vec<u8>>, SourceError> {
        self.http.get(path, accept_not_found, deadline).await
    }

    async fn read_backward(
        &self,
        log_id: &str,
        deadline: Deadline,
    ) -> Result<Option<LogEntry>, SourceError> {
        if log_id == ALL_STREAM {
            return self.read_all_head(deadline).await;
        }
        let options = ReadStreamOptions::default()
            .position(StreamPosition::End)
            .backwards()
            .max_count(1);
        Ok(self.read_one(log_id, options, deadline).await?.map(entry))
    }

    async fn read_forward(
        &self,
        log_id: &str,
        from: u64,
        deadline: Deadline,
    ) -> Result<Option<LogEntry>, SourceError> {
        let options = ReadStreamOptions::default()
            .position(StreamPosition::Position(from))
            .forwards()
            .max_count(1);
        Ok(self.read_one(log_id, options, deadline).await?.map(entry))
    }

    /// Latest event of the `$$<log_id>` metadata stream.
    async fn read_metadata(
        &self,
        log_id: &str,
        deadline: Deadline,
    ) -> Result<Option<u64>, SourceError> {
        let options = ReadStreamOptions::default()
            .position(StreamPosition::End)
            .backwards()
            .max_count(1);
        let metadata_log = format!("$${}", log_id);
        let Some(event) = self.read_one(&metadata_log, options, deadline).await? else {
            return Ok(None);
        };
        if event.data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let metadata: StreamMetadata = serde_json::from_slice(&event.data)?;
        Ok(metadata.truncate_before)
    }

    async fn log_reads_available(&self, _deadline: Deadline) -> Result<bool, SourceError> {
        Ok(true)
    }
}
