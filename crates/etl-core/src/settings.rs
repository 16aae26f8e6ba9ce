use clap::{CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{EtlError, Result};
use crate::period::PeriodOrder;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Consolidate, enrich and aggregate ANS quarterly expense ledgers
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ans-etl",
    about = "Consolidate, enrich and aggregate ANS quarterly expense ledgers",
    version
)]
pub struct Settings {
    /// Pipeline mode
    #[arg(
        long,
        default_value = "run",
        value_parser = ["run", "consolidate", "transform", "summary"]
    )]
    pub mode: String,

    /// Directory holding the <quarter>T<year> period folders
    #[arg(long, env = "ANS_ETL_INPUT_DIR", default_value = ".")]
    pub input_dir: PathBuf,

    /// Operator registry file (CADOP, ';'-delimited, Latin-1)
    #[arg(long, env = "ANS_ETL_REGISTRY", default_value = "Relatorio_cadop.csv")]
    pub registry: PathBuf,

    /// Directory receiving the CSV and zip artifacts
    #[arg(long, env = "ANS_ETL_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Order in which period folders are concatenated
    #[arg(
        long,
        default_value = "lexicographic",
        value_parser = ["lexicographic", "chronological"]
    )]
    pub period_order: String,

    /// Number of operators and of states listed by the summary
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Registry number whose quarterly history the summary prints
    #[arg(long)]
    pub operator: Option<String>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub report_json: bool,

    /// JSON config file with default paths
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path (stderr when absent)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── PipelineConfig ─────────────────────────────────────────────────────────────

/// Optional defaults read from `~/.ans-etl/config.json` or `--config`.
///
/// Values here only replace CLI defaults; anything given on the command line
/// or through an environment variable wins.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_order: Option<PeriodOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl PipelineConfig {
    /// Default location, `~/.ans-etl/config.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".ans-etl").join("config.json")
    }

    /// Load the config at `path`. A missing file yields the default config;
    /// a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| EtlError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        match serde_json::from_str(&content) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed config file");
                Err(e.into())
            }
        }
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and fill defaults from the config file.
    pub fn load() -> Result<Self> {
        Self::load_impl(std::env::args_os().collect(), &PipelineConfig::config_path())
    }

    /// Full implementation – accepts args and the fallback config path so
    /// that tests can redirect to a temporary directory.
    pub fn load_impl(args: Vec<std::ffi::OsString>, default_config: &Path) -> Result<Self> {
        let matches = Settings::command().get_matches_from(args);
        let mut settings =
            Settings::from_arg_matches(&matches).map_err(|e| EtlError::Config(e.to_string()))?;

        let config = match &settings.config {
            Some(explicit) if !explicit.exists() => {
                return Err(EtlError::Config(format!(
                    "config file not found: {}",
                    explicit.display()
                )));
            }
            Some(explicit) => PipelineConfig::load_from(explicit)?,
            None => PipelineConfig::load_from(default_config)?,
        };

        // NOTE: clap stores the arg id using the *field name* (underscores).
        if is_default(&matches, "input_dir") {
            if let Some(v) = config.input_dir {
                settings.input_dir = v;
            }
        }
        if is_default(&matches, "registry") {
            if let Some(v) = config.registry {
                settings.registry = v;
            }
        }
        if is_default(&matches, "output_dir") {
            if let Some(v) = config.output_dir {
                settings.output_dir = v;
            }
        }
        if is_default(&matches, "period_order") {
            if let Some(v) = config.period_order {
                settings.period_order = v.as_str().to_string();
            }
        }
        if is_default(&matches, "log_level") {
            if let Some(v) = config.log_level {
                settings.log_level = v.to_uppercase();
            }
        }

        // --debug overrides log level.
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        Ok(settings)
    }

    /// Typed view of `--period-order`.
    pub fn period_order(&self) -> Result<PeriodOrder> {
        self.period_order.parse()
    }
}

// ── Helper: check if an arg still holds its default ────────────────────────────

/// Returns `true` when `name` was neither given on the command line nor
/// through its environment variable.
fn is_default(matches: &clap::ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        None | Some(clap::parser::ValueSource::DefaultValue)
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, config: &PipelineConfig) -> PathBuf {
        let path = PipelineConfig::config_path_in(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, serde_json::to_string_pretty(config).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["ans-etl"]);

        assert_eq!(settings.mode, "run");
        assert_eq!(settings.registry, PathBuf::from("Relatorio_cadop.csv"));
        assert_eq!(settings.period_order, "lexicographic");
        assert_eq!(settings.top, 10);
        assert!(settings.operator.is_none());
        assert!(!settings.report_json);
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_cli_mode_and_order() {
        let settings = Settings::parse_from([
            "ans-etl",
            "--mode",
            "transform",
            "--period-order",
            "chronological",
        ]);
        assert_eq!(settings.mode, "transform");
        assert_eq!(settings.period_order().unwrap(), PeriodOrder::Chronological);
    }

    #[test]
    fn test_settings_rejects_unknown_mode() {
        assert!(Settings::try_parse_from(["ans-etl", "--mode", "serve"]).is_err());
    }

    #[test]
    fn test_config_missing_is_default() {
        let tmp = TempDir::new().expect("tempdir");
        let path = PipelineConfig::config_path_in(tmp.path());
        let loaded = PipelineConfig::load_from(&path).unwrap();
        assert_eq!(loaded, PipelineConfig::default());
    }

    #[test]
    fn test_config_malformed_is_error() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            PipelineConfig::load_from(&path),
            Err(EtlError::JsonParse(_))
        ));
    }

    #[test]
    fn test_config_unknown_period_order_is_error() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"period_order": "random"}"#).unwrap();

        let result = Settings::load_impl(
            vec!["ans-etl".into(), "--config".into(), path.into_os_string()],
            &PipelineConfig::config_path_in(tmp.path()),
        );
        assert!(matches!(result, Err(EtlError::JsonParse(_))));
    }

    #[test]
    fn test_load_impl_fills_defaults_from_config() {
        let tmp = TempDir::new().expect("tempdir");
        let path = write_config(
            &tmp,
            &PipelineConfig {
                registry: Some(PathBuf::from("/data/cadop.csv")),
                period_order: Some(PeriodOrder::Chronological),
                ..Default::default()
            },
        );

        let settings = Settings::load_impl(vec!["ans-etl".into()], &path).unwrap();
        assert_eq!(settings.registry, PathBuf::from("/data/cadop.csv"));
        assert_eq!(settings.period_order, "chronological");
    }

    #[test]
    fn test_load_impl_cli_overrides_config() {
        let tmp = TempDir::new().expect("tempdir");
        let path = write_config(
            &tmp,
            &PipelineConfig {
                output_dir: Some(PathBuf::from("/from/config")),
                ..Default::default()
            },
        );

        let settings = Settings::load_impl(
            vec!["ans-etl".into(), "--output-dir".into(), "/from/cli".into()],
            &path,
        )
        .unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_load_impl_explicit_config_must_exist() {
        let tmp = TempDir::new().expect("tempdir");
        let missing = tmp.path().join("nope.json");
        let result = Settings::load_impl(
            vec!["ans-etl".into(), "--config".into(), missing.into_os_string()],
            &PipelineConfig::config_path_in(tmp.path()),
        );
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn test_load_impl_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load_impl(
            vec!["ans-etl".into(), "--debug".into()],
            &PipelineConfig::config_path_in(tmp.path()),
        )
        .unwrap();
        assert_eq!(settings.log_level, "DEBUG");
    }
}
