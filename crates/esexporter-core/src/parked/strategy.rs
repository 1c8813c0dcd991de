//! Selection of the parked-message strategy for one scrape.

use crate::version::ServerVersion;

/// How parked-message stats are obtained during a scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkedStrategy {
    /// Parked stats switched off. Fields stay unavailable.
    Disabled,
    /// Derive count and age from reads of the parked log.
    LogReads,
    /// Count from subscription group info. Age stays unavailable.
    GroupInfo,
    /// Neither source exists on this server.
    Unsupported,
}

impl ParkedStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParkedStrategy::Disabled => "disabled",
            ParkedStrategy::LogReads => "log reads",
            ParkedStrategy::GroupInfo => "group info",
            ParkedStrategy::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for ParkedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks exactly one strategy.
///
/// `log_reads_available` comes from `SourceReader::log_reads_available`.
/// Log reads win whenever they are available, independent of the version.
pub fn select_strategy(
    enabled: bool,
    log_reads_available: bool,
    version: &ServerVersion,
) -> ParkedStrategy {
    if !enabled {
        ParkedStrategy::Disabled
    } else if log_reads_available {
        ParkedStrategy::LogReads
    } else if version.reports_parked_message_count() {
        ParkedStrategy::GroupInfo
    } else {
        ParkedStrategy::Unsupported
    }
}
