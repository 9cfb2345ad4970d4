// src/scheduler/mod.rs

pub mod merge;
pub mod parallel;

pub use merge::{MergedReport, NullSink, SuiteSink, merge_results};
pub use parallel::{DEFAULT_CONCURRENCY, ParallelConfig, ParallelScheduler, ParallelTestResult};
