/// Index into an append-only log.
///
/// Event numbers are zero-based per stream; commit positions address the
/// global `$all` log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogPosition {
    EventNumber(u64),
    CommitPosition(u64),
}

impl LogPosition {
    pub fn index(&self) -> u64 {
        match *self {
            LogPosition::EventNumber(n) | LogPosition::CommitPosition(n) => n,
        }
    }
}

/// Commit/prepare pair from a `C:<commit>/P:<prepare>` string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventPosition {
    pub commit: i64,
    pub prepare: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionParseError {
    Empty,
    Invalid(String),
}

impl std::fmt::Display for PositionParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionParseError::Empty => write!(f, "empty position"),
            PositionParseError::Invalid(s) => write!(f, "invalid event position: {}", s),
        }
    }
}

impl std::error::Error for PositionParseError {}

impl EventPosition {
    pub fn parse(s: &str) -> Result<Self, PositionParseError> {
        if s.is_empty() {
            return Err(PositionParseError::Empty);
        }
        let invalid = || PositionParseError::Invalid(s.to_string());

        let (commit, prepare) = s.split_once('/').ok_or_else(invalid)?;
        let commit = commit.strip_prefix("C:").ok_or_else(invalid)?;
        let prepare = prepare.strip_prefix("P:").ok_or_else(invalid)?;

        Ok(EventPosition {
            commit: commit.parse().map_err(|_| invalid())?,
            prepare: prepare.parse().map_err(|_| invalid())?,
        })
    }
}
