use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the ETL pipeline.
///
/// Only conditions that leave a stage without usable input are represented
/// here. Per-line and per-period problems are skipped and logged by the
/// stage that meets them.
#[derive(Error, Debug)]
pub enum EtlError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact could not be written or moved into place.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory holding the period folders does not exist.
    #[error("Input directory not found: {0}")]
    InputDirNotFound(PathBuf),

    /// Every period directory yielded zero usable rows.
    #[error("No valid quarterly data found under {0}")]
    NoValidData(PathBuf),

    /// The operator registry file does not exist.
    #[error("Registry file not found: {0}")]
    RegistryNotFound(PathBuf),

    /// The consolidated artifact expected by the enrichment stage is absent.
    #[error("Consolidated file not found: {0}")]
    ConsolidatedNotFound(PathBuf),

    /// The aggregate artifact expected by the summary is absent.
    #[error("Aggregated file not found: {0}")]
    AggregateNotFound(PathBuf),

    /// A required column is absent from a tabular file's header.
    #[error("Missing column {column} in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// A period value outside the `<1-4>T<yyyy>` domain.
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A delimited file could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The zip writer failed while packaging an artifact.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the ETL crates.
pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = EtlError::FileRead {
            path: PathBuf::from("/data/1T2024/ledger.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/data/1T2024/ledger.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_no_valid_data() {
        let err = EtlError::NoValidData(PathBuf::from("/data"));
        assert_eq!(err.to_string(), "No valid quarterly data found under /data");
    }

    #[test]
    fn test_error_display_registry_not_found() {
        let err = EtlError::RegistryNotFound(PathBuf::from("Relatorio_cadop.csv"));
        assert_eq!(err.to_string(), "Registry file not found: Relatorio_cadop.csv");
    }

    #[test]
    fn test_error_display_missing_column() {
        let err = EtlError::MissingColumn {
            path: PathBuf::from("cadop.csv"),
            column: "UF".to_string(),
        };
        assert_eq!(err.to_string(), "Missing column UF in cadop.csv");
    }

    #[test]
    fn test_error_display_invalid_period() {
        let err = EtlError::InvalidPeriod("5T2024".to_string());
        assert_eq!(err.to_string(), "Invalid period: 5T2024");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: EtlError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: EtlError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
