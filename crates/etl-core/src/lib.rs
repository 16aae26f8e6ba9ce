//! Core types for the ANS expense ETL pipeline.
//!
//! Holds the record shapes exchanged between stages, the error type, the
//! locale-aware numeric and identifier helpers, and the CLI settings.

pub mod cnpj;
pub mod error;
pub mod formatting;
pub mod models;
pub mod period;
pub mod settings;
pub mod text;

pub use error::{EtlError, Result};
