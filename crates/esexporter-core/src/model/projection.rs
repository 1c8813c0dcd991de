use serde::Deserialize;

use super::null_as_default;

/// Source: `GET /projections/all-non-transient`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectionStats {
    #[serde(deserialize_with = "null_as_default")]
    pub effective_name: String,
    /// Free-form status, e.g. `Running`, `Stopped`, `Faulted (Enabled)`.
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    /// Percent, 0..=100.
    pub progress: f64,
    pub events_processed_after_restart: i64,
}

impl ProjectionStats {
    pub fn is_running(&self) -> bool {
        self.status == "Running"
    }

    pub fn is_stopped(&self) -> bool {
        self.status == "Stopped"
    }

    pub fn is_faulted(&self) -> bool {
        self.status.contains("Faulted")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ProjectionsEnvelope {
    pub projections: Vec<ProjectionStats>,
}
