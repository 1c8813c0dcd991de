//! Parked-message estimation.
//!
//! A persistent subscription group moves messages it gave up on into a
//! dedicated parked log. Replaying parked messages advances the log's
//! truncation marker (`$tb`) instead of deleting entries, so the backlog is
//! derived from three reads:
//!
//! 1. the last entry (backward read), giving the last index,
//! 2. the truncation marker (metadata read),
//! 3. the oldest retained entry (forward read from the marker), giving its age.
//!
//! ```text
//!   0        tb                 last
//!   ├────────┼───────────────────┤
//!    replayed    parked = last + 1 - tb
//! ```
//!
//! The reads are not atomic. A replay racing with the backward read can leave
//! the marker ahead of the last index; that case is reported as nothing parked.

mod strategy;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::deadline::Deadline;
use crate::error::SourceError;
use crate::model::ParkedStats;
use crate::source::SourceReader;

pub use strategy::{ParkedStrategy, select_strategy};

/// Identifier of the parked log of a subscription group.
pub fn parked_log_id(stream: &str, group: &str) -> String {
    format!("$persistentsubscription-{}::{}-parked", stream, group)
}

/// Estimates the parked backlog of `stream::group`.
///
/// An empty or missing parked log is a known zero. Read errors are returned
/// to the caller, which decides how to degrade.
pub async fn estimate<S>(
    reader: &S,
    stream: &str,
    group: &str,
    deadline: Deadline,
) -> Result<ParkedStats, SourceError>
where
    S: SourceReader + ?Sized,
{
    estimate_at(reader, stream, group, deadline, Utc::now).await
}

/// Same as [`estimate`] with the clock supplied by the caller. `now` is
/// sampled right after the oldest entry is read.
pub async fn estimate_at<S, F>(
    reader: &S,
    stream: &str,
    group: &str,
    deadline: Deadline,
    now: F,
) -> Result<ParkedStats, SourceError>
where
    S: SourceReader + ?Sized,
    F: FnOnce() -> DateTime<Utc> + Send,
{
    let log_id = parked_log_id(stream, group);

    let Some(last) = reader.read_backward(&log_id, deadline).await? else {
        return Ok(ParkedStats::empty());
    };
    let last_index = to_signed(last.position.index())?;

    let truncate_before = match reader.read_metadata(&log_id, deadline).await? {
        Some(tb) => to_signed(tb)?,
        None => 0,
    };

    let parked = last_index + 1 - truncate_before;
    if parked < 0 {
        debug!(
            stream = %stream,
            group = %group,
            last_index,
            truncate_before,
            "truncation marker ahead of last parked message, reporting none parked"
        );
        return Ok(ParkedStats::empty());
    }
    if parked == 0 {
        return Ok(ParkedStats::empty());
    }

    let oldest_index = (last_index + 1 - parked) as u64;
    let oldest_age_seconds = reader
        .read_forward(&log_id, oldest_index, deadline)
        .await?
        .map(|entry| age_seconds(now(), entry.created));

    Ok(ParkedStats {
        count: Some(parked as u64),
        oldest_age_seconds,
    })
}

fn to_signed(index: u64) -> Result<i64, SourceError> {
    i64::try_from(index).map_err(|_| SourceError::Decode(format!("log index {} out of range", index)))
}

/// Whole seconds between `created` and `now`, never negative.
fn age_seconds(now: DateTime<Utc>, created: DateTime<Utc>) -> f64 {
    (now - created).num_seconds().max(0) as f64
}
