//! xref Core Components
//!
//! This crate provides the pieces shared by the indexing engine and the
//! command-line front end: run configuration, error types and metrics.

mod config;
mod error;
mod metrics;

pub use config::{IndexerConfig, MacroReflowConfig, PLATFORM_ENV};
pub use error::CoreError;
pub use metrics::{LatencyTracker, RunMetrics};
