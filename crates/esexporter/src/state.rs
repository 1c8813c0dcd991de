//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use esexporter_core::StatsCollector;

/// Everything a scrape needs. Immutable after startup, so no lock.
pub(crate) struct AppState<S> {
    pub(crate) collector: StatsCollector<S>,
    /// Upper bound for one scrape.
    pub(crate) timeout: Duration,
    /// Emit member-state gauges.
    pub(crate) cluster_mode: bool,
}

pub(crate) type SharedState<S> = Arc<AppState<S>>;
