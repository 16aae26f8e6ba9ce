//! Runtime layer for the ANS expense ETL pipeline.
//!
//! Sequences the stages of a batch run and collects the run report.

pub mod pipeline;
pub mod report;

pub use etl_core as core;
pub use etl_data as data;
