//! Server version parsing and comparison.
//!
//! EventStoreDB reports versions with four numeric segments (`20.6.0.0`),
//! newer builds with three (`23.10.1`). Segments are compared numerically,
//! missing trailing segments count as zero. Any build suffix after `-` or `+`
//! is ignored.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Version string as reported by `/info`.
///
/// Comparisons on an unparseable version always return `false`, so callers
/// fall through to their most conservative branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerVersion(String);

impl Default for ServerVersion {
    fn default() -> Self {
        Self("0.0.0.0".to_string())
    }
}

impl From<&str> for ServerVersion {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ServerVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_at_least(&self, min: &str) -> bool {
        matches!(
            compare(&self.0, min),
            Some(Ordering::Greater | Ordering::Equal)
        )
    }

    /// Whether `/subscriptions/{stream}/{group}/info` carries `parkedMessageCount`.
    pub fn reports_parked_message_count(&self) -> bool {
        self.is_at_least("21.2.0.0")
    }
}

fn segments(version: &str) -> Option<Vec<u64>> {
    let core = version
        .trim()
        .split(['-', '+'])
        .next()
        .unwrap_or_default();
    if core.is_empty() {
        return None;
    }
    core.split('.').map(|s| s.parse::<u64>().ok()).collect()
}

fn compare(a: &str, b: &str) -> Option<Ordering> {
    let a = segments(a)?;
    let b = segments(b)?;
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}
