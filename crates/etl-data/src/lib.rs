//! Stage implementations for the ANS expense ETL pipeline.
//!
//! Discovers and parses the quarterly ledgers, consolidates them into one
//! artifact, joins the consolidated records against the operator registry,
//! and aggregates expense statistics per operator identity.

pub mod aggregator;
pub mod consolidator;
pub mod enricher;
pub mod reader;
pub mod registry;
pub mod summary;
pub mod writer;

pub use etl_core as core;
