//! In-memory `SourceReader` for testing.
//!
//! This module provides `MockSource` and pre-built scenarios for testing the
//! collector without a running server.

mod reader;
mod scenarios;

pub use reader::{MockResponse, MockSource, ReadKind};
pub use scenarios::PARKED_IN_BILLING;
