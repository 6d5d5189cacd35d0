//! Offline benchmarking: destructive dataset replay and the results log.

pub mod dataset;
pub mod results;

pub use dataset::{DatasetError, DatasetReplaySource, ReplayRecord};
pub use results::{BenchmarkResultRecord, BenchmarkResults};
