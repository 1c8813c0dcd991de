//! In-memory source with canned HTTP responses and logs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::deadline::Deadline;
use crate::error::SourceError;
use crate::model::{ALL_STREAM, LogPosition};
use crate::source::{LogEntry, SourceReader};

/// Canned answer for a `get` path.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Json(String),
    NotFound,
    Status(u16),
    Transport(String),
    /// Never answers; the call ends with `SourceError::Timeout` at the deadline.
    Hang,
}

/// Log read operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadKind {
    Backward,
    Forward,
    Metadata,
}

#[derive(Debug, Clone)]
enum Fault {
    Error(SourceError),
    Hang,
    EndOfData,
}

#[derive(Debug, Clone, Default)]
struct MockLog {
    /// Creation time of every entry ever appended, indexed by event number.
    created: Vec<DateTime<Utc>>,
    /// Entries below this index are no longer readable.
    visible_from: u64,
    /// Truncation marker reported by metadata reads.
    truncate_before: Option<u64>,
}

/// In-memory source for testing.
///
/// Paths not registered with [`MockSource::respond`] answer 404.
#[derive(Debug, Default)]
pub struct MockSource {
    responses: HashMap<String, MockResponse>,
    logs: HashMap<String, MockLog>,
    faults: HashMap<(ReadKind, String), Fault>,
    latency: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&mut self, path: impl Into<String>, response: MockResponse) {
        self.responses.insert(path.into(), response);
    }

    pub fn respond_json(&mut self, path: impl Into<String>, body: impl Into<String>) {
        self.respond(path, MockResponse::Json(body.into()));
    }

    /// Appends entries created at the given times to `log_id`.
    pub fn append(&mut self, log_id: &str, created: impl IntoIterator<Item = DateTime<Utc>>) {
        self.logs
            .entry(log_id.to_string())
            .or_default()
            .created
            .extend(created);
    }

    /// Appends `count` entries created `age` ago.
    pub fn append_aged(&mut self, log_id: &str, count: usize, age: Duration) {
        let age = chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::zero());
        let created = Utc::now() - age;
        self.append(log_id, std::iter::repeat_n(created, count));
    }

    /// Truncates `log_id` before `before`, updating both the readable range
    /// and the metadata marker.
    pub fn truncate(&mut self, log_id: &str, before: u64) {
        let log = self.logs.entry(log_id.to_string()).or_default();
        log.visible_from = before;
        log.truncate_before = Some(before);
    }

    /// Sets the metadata marker without touching the readable range, as seen
    /// when a truncation races with a backward read.
    pub fn set_stale_metadata(&mut self, log_id: &str, truncate_before: u64) {
        self.logs
            .entry(log_id.to_string())
            .or_default()
            .truncate_before = Some(truncate_before);
    }

    pub fn fail_read(&mut self, kind: ReadKind, log_id: &str, error: SourceError) {
        self.faults
            .insert((kind, log_id.to_string()), Fault::Error(error));
    }

    pub fn hang_read(&mut self, kind: ReadKind, log_id: &str) {
        self.faults.insert((kind, log_id.to_string()), Fault::Hang);
    }

    /// Makes reads of `kind` on `log_id` report end of data, as when the
    /// entry vanished between two reads.
    pub fn end_of_data(&mut self, kind: ReadKind, log_id: &str) {
        self.faults
            .insert((kind, log_id.to_string()), Fault::EndOfData);
    }

    /// Delay applied to every call.
    pub fn set_latency(&mut self, latency: Duration) {
        self.latency = Some(latency);
    }

    /// Calls made so far, e.g. `GET /info` or `backward orders`.
    pub fn calls(&self) -> Vec<String> {
        self.lock_calls().clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.lock_calls().iter().filter(|c| *c == call).count()
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<String>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self, call: String, deadline: Deadline) -> Result<(), SourceError> {
        self.lock_calls().push(call);
        if let Some(latency) = self.latency {
            let wake = tokio::time::Instant::now() + latency;
            if wake >= deadline.instant() {
                tokio::time::sleep_until(deadline.instant()).await;
                return Err(SourceError::Timeout);
            }
            tokio::time::sleep_until(wake).await;
        }
        Ok(())
    }

    /// `Ok(false)` when the read must report end of data.
    async fn check_fault(
        &self,
        kind: ReadKind,
        log_id: &str,
        deadline: Deadline,
    ) -> Result<bool, SourceError> {
        match self.faults.get(&(kind, log_id.to_string())) {
            Some(Fault::Error(e)) => Err(e.clone()),
            Some(Fault::Hang) => {
                tokio::time::sleep_until(deadline.instant()).await;
                Err(SourceError::Timeout)
            }
            Some(Fault::EndOfData) => Ok(false),
            None => Ok(true),
        }
    }

    fn entry(log_id: &str, log: &MockLog, index: u64) -> Option<LogEntry> {
        let created = *log.created.get(usize::try_from(index).ok()?)?;
        let position = if log_id == ALL_STREAM {
            LogPosition::CommitPosition(index)
        } else {
            LogPosition::EventNumber(index)
        };
        Some(LogEntry { position, created })
    }
}

#[async_trait]
impl SourceReader for MockSource {
    async fn get(
        &self,
        path: &str,
        accept_not_found: bool,
        deadline: Deadline,
    ) -> Result<Option<Vec<u8>>, SourceError> {
        self.enter(format!("GET {}", path), deadline).await?;

        let not_found = || {
            if accept_not_found {
                Ok(None)
            } else {
                Err(SourceError::Status {
                    url: path.to_string(),
                    status: 404,
                })
            }
        };
        match self.responses.get(path) {
            Some(MockResponse::Json(body)) => Ok(Some(body.clone().into_bytes())),
            Some(MockResponse::NotFound) | None => not_found(),
            Some(MockResponse::Status(404)) => not_found(),
            Some(MockResponse::Status(status)) => Err(SourceError::Status {
                url: path.to_string(),
                status: *status,
            }),
            Some(MockResponse::Transport(msg)) => Err(SourceError::Transport(msg.clone())),
            Some(MockResponse::Hang) => {
                tokio::time::sleep_until(deadline.instant()).await;
                Err(SourceError::Timeout)
            }
        }
    }

    async fn read_backward(
        &self,
        log_id: &str,
        deadline: Deadline,
    ) -> Result<Option<LogEntry>, SourceError> {
        self.enter(format!("backward {}", log_id), deadline).await?;
        if !self.check_fault(ReadKind::Backward, log_id, deadline).await? {
            return Ok(None);
        }

        let Some(log) = self.logs.get(log_id) else {
            return Ok(None);
        };
        let len = log.created.len() as u64;
        if len == 0 || len <= log.visible_from {
            return Ok(None);
        }
        Ok(Self::entry(log_id, log, len - 1))
    }

    async fn read_forward(
        &self,
        log_id: &str,
        from: u64,
        deadline: Deadline,
    ) -> Result<Option<LogEntry>, SourceError> {
        self.enter(format!("forward {} {}", log_id, from), deadline)
            .await?;
        if !self.check_fault(ReadKind::Forward, log_id, deadline).await? {
            return Ok(None);
        }

        let Some(log) = self.logs.get(log_id) else {
            return Ok(None);
        };
        Ok(Self::entry(log_id, log, from.max(log.visible_from)))
    }

    async fn read_metadata(
        &self,
        log_id: &str,
        deadline: Deadline,
    ) -> Result<Option<u64>, SourceError> {
        self.enter(format!("metadata {}", log_id), deadline).await?;
        if !self.check_fault(ReadKind::Metadata, log_id, deadline).await? {
            return Ok(None);
        }

        Ok(self.logs.get(log_id).and_then(|log| log.truncate_before))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_unregistered_path_is_not_found() {
        let source = MockSource::new();
        assert_eq!(source.get("/nope", true, deadline()).await, Ok(None));
        assert_eq!(
            source.get("/nope", false, deadline()).await,
            Err(SourceError::Status {
                url: "/nope".to_string(),
                status: 404
            })
        );
        assert_eq!(source.call_count("GET /nope"), 2);
    }

    #[tokio::test]
    async fn test_truncated_log_reads() {
        let mut source = MockSource::new();
        source.append_aged("parked", 5, Duration::from_secs(60));
        source.truncate("parked", 2);

        let last = source.read_backward("parked", deadline()).await.unwrap();
        assert_eq!(last.unwrap().position, LogPosition::EventNumber(4));

        let first = source.read_forward("parked", 0, deadline()).await.unwrap();
        assert_eq!(first.unwrap().position, LogPosition::EventNumber(2));

        assert_eq!(source.read_metadata("parked", deadline()).await, Ok(Some(2)));

        source.truncate("parked", 5);
        assert_eq!(source.read_backward("parked", deadline()).await, Ok(None));
        assert_eq!(source.read_forward("parked", 0, deadline()).await, Ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_ends_at_deadline() {
        let mut source = MockSource::new();
        source.hang_read(ReadKind::Metadata, "parked");

        let start = tokio::time::Instant::now();
        let deadline = Deadline::after(Duration::from_secs(3));
        let result = source.read_metadata("parked", deadline).await;

        assert_eq!(result, Err(SourceError::Timeout));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_log_reads_follow_atom_pub_head() {
        let mut source = MockSource::new();
        assert_eq!(source.log_reads_available(deadline()).await, Ok(false));

        source.respond_json(crate::source::ATOM_PUB_PROBE, r#"{ "entries": [] }"#);
        assert_eq!(source.log_reads_available(deadline()).await, Ok(true));

        source.respond(crate::source::ATOM_PUB_PROBE, MockResponse::Status(401));
        assert!(matches!(
            source.log_reads_available(deadline()).await,
            Err(SourceError::Status { status: 401, .. })
        ));
    }
}
