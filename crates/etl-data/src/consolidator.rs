//! Concatenation of all period batches into the consolidated artifact.

use std::path::{Path, PathBuf};

use etl_core::error::{EtlError, Result};
use etl_core::formatting::{format_decimal, parse_decimal};
use etl_core::models::{PeriodExpenseRecord, CONSOLIDATED_HEADER, UNRESOLVED_NAME};
use etl_core::period::{Period, PeriodOrder};
use etl_core::text::strip_bom;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::reader::{discover_periods, ingest_period, IngestStats};
use crate::writer::Artifact;

/// File stem of the consolidated artifact.
pub const CONSOLIDATED_STEM: &str = "consolidado_despesas";

// ── Public types ──────────────────────────────────────────────────────────────

/// What happened to one period folder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PeriodStatus {
    /// Contributed at least one record.
    Loaded,
    /// The folder holds no file.
    NoFile,
    /// The ledger was read but no row survived filtering.
    Empty,
    /// The ledger could not be used (missing columns, unreadable file).
    Unusable(String),
}

/// Per-period line of the run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub dir_name: String,
    pub period: Period,
    pub file: Option<PathBuf>,
    pub records: usize,
    pub status: PeriodStatus,
}

/// Result of the consolidation stage.
#[derive(Debug, Clone)]
pub struct Consolidation {
    pub records: Vec<PeriodExpenseRecord>,
    pub periods: Vec<PeriodSummary>,
    pub stats: IngestStats,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Ingest every period folder under `input_dir` and concatenate the results.
///
/// Empty and unusable periods are skipped. Fails with
/// [`EtlError::NoValidData`] only when no period yields a record.
pub fn consolidate(input_dir: &Path, order: PeriodOrder) -> Result<Consolidation> {
    let sources = discover_periods(input_dir, order)?;

    let mut records = Vec::new();
    let mut periods = Vec::with_capacity(sources.len());
    let mut stats = IngestStats::default();

    for source in &sources {
        info!("Processing {}...", source.dir_name);

        let (status, file, count) = match ingest_period(source) {
            Ok(batch) => {
                stats.merge(&batch.stats);
                let count = batch.records.len();
                let status = match (&batch.file, count) {
                    (None, _) => PeriodStatus::NoFile,
                    (Some(_), 0) => PeriodStatus::Empty,
                    (Some(_), _) => PeriodStatus::Loaded,
                };
                if status != PeriodStatus::Loaded {
                    debug!("{}: no data ({:?})", source.dir_name, status);
                }
                records.extend(batch.records);
                (status, batch.file, count)
            }
            Err(e) => {
                warn!("Skipping {}: {}", source.dir_name, e);
                (PeriodStatus::Unusable(e.to_string()), None, 0)
            }
        };

        periods.push(PeriodSummary {
            dir_name: source.dir_name.clone(),
            period: source.period,
            file,
            records: count,
            status,
        });
    }

    if records.is_empty() {
        return Err(EtlError::NoValidData(input_dir.to_path_buf()));
    }

    info!(
        "Consolidated {} records from {} of {} period folders",
        records.len(),
        periods
            .iter()
            .filter(|p| p.status == PeriodStatus::Loaded)
            .count(),
        periods.len()
    );

    Ok(Consolidation {
        records,
        periods,
        stats,
    })
}

/// Persist consolidated records as `consolidado_despesas.csv` (`,`-delimited,
/// BOM) and its single-entry zip under `output_dir`.
pub fn write_consolidated(records: &[PeriodExpenseRecord], output_dir: &Path) -> Result<Artifact> {
    let artifact = Artifact::in_dir(output_dir, CONSOLIDATED_STEM);
    let rows = records.iter().map(|r| {
        vec![
            r.operator_id.clone(),
            UNRESOLVED_NAME.to_string(),
            r.period.quarter.to_string(),
            r.period.year.to_string(),
            format_decimal(r.expense_amount),
        ]
    });
    artifact.write(b',', &CONSOLIDATED_HEADER, rows)?;
    info!("Consolidated artifact written to {}", artifact.zip_path.display());
    Ok(artifact)
}

/// Read the consolidated CSV back into records.
///
/// Rows whose period or amount does not parse are skipped with a warning.
pub fn read_consolidated(path: &Path) -> Result<Vec<PeriodExpenseRecord>> {
    if !path.is_file() {
        return Err(EtlError::ConsolidatedNotFound(path.to_path_buf()));
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| strip_bom(h).trim().to_string())
        .collect();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| EtlError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let id_idx = column(CONSOLIDATED_HEADER[0])?;
    let quarter_idx = column(CONSOLIDATED_HEADER[2])?;
    let year_idx = column(CONSOLIDATED_HEADER[3])?;
    let amount_idx = column(CONSOLIDATED_HEADER[4])?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping unreadable row in {}: {}", path.display(), e);
                continue;
            }
        };
        let field = |idx: usize| row.get(idx).unwrap_or_default().trim();

        let period = field(quarter_idx)
            .parse::<u8>()
            .ok()
            .zip(field(year_idx).parse::<u16>().ok())
            .and_then(|(quarter, year)| Period::new(quarter, year).ok());
        let amount = parse_decimal(field(amount_idx));

        match (period, amount) {
            (Some(period), Some(expense_amount)) => records.push(PeriodExpenseRecord {
                operator_id: field(id_idx).to_string(),
                period,
                expense_amount,
            }),
            _ => warn!("Skipping invalid row in {}: {:?}", path.display(), row),
        }
    }

    debug!("Read {} consolidated records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn record(id: &str, quarter: u8, year: u16, amount: f64) -> PeriodExpenseRecord {
        PeriodExpenseRecord {
            operator_id: id.to_string(),
            period: Period::new(quarter, year).unwrap(),
            expense_amount: amount,
        }
    }

    #[test]
    fn test_consolidate_concatenates_in_dir_order() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir.path().join("2T2023").join("a.csv"),
            "REG_ANS;VL_SALDO_FINAL\n1;10,00\n",
        );
        write_file(
            &dir.path().join("1T2024").join("a.csv"),
            "REG_ANS;VL_SALDO_FINAL\n1;20,00\n2;30,00\n",
        );

        let result = consolidate(dir.path(), PeriodOrder::Lexicographic).unwrap();
        let amounts: Vec<f64> = result.records.iter().map(|r| r.expense_amount).collect();
        assert_eq!(amounts, vec![20.0, 30.0, 10.0]);
        assert_eq!(result.stats.records_kept, 3);
    }

    #[test]
    fn test_consolidate_keeps_same_operator_across_periods() {
        let dir = TempDir::new().unwrap();
        for p in ["1T2024", "2T2024"] {
            write_file(
                &dir.path().join(p).join("a.csv"),
                "REG_ANS;VL_SALDO_FINAL\n1;10,00\n",
            );
        }

        let result = consolidate(dir.path(), PeriodOrder::Lexicographic).unwrap();
        assert_eq!(result.records.len(), 2);
    }

    #[test]
    fn test_consolidate_skips_empty_and_unusable_periods() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("1T2024")).unwrap();
        write_file(
            &dir.path().join("2T2024").join("a.csv"),
            "REG_ANS;VL_SALDO_FINAL\n1;0,00\n",
        );
        write_file(&dir.path().join("3T2024").join("a.csv"), "FOO;BAR\n1;2\n");
        write_file(
            &dir.path().join("4T2024").join("a.csv"),
            "REG_ANS;VL_SALDO_FINAL\n1;5,00\n",
        );

        let result = consolidate(dir.path(), PeriodOrder::Lexicographic).unwrap();
        let statuses: Vec<&PeriodStatus> = result.periods.iter().map(|p| &p.status).collect();
        assert_eq!(statuses[0], &PeriodStatus::NoFile);
        assert_eq!(statuses[1], &PeriodStatus::Empty);
        assert!(matches!(statuses[2], PeriodStatus::Unusable(_)));
        assert_eq!(statuses[3], &PeriodStatus::Loaded);
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_consolidate_fails_when_every_period_is_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("1T2024")).unwrap();
        std::fs::create_dir_all(dir.path().join("not-a-period")).unwrap();

        let result = consolidate(dir.path(), PeriodOrder::Lexicographic);
        assert!(matches!(result, Err(EtlError::NoValidData(_))));
    }

    #[test]
    fn test_write_consolidated_layout() {
        let dir = TempDir::new().unwrap();
        let artifact =
            write_consolidated(&[record("123456", 1, 2024, 1500.0)], dir.path()).unwrap();

        let text = std::fs::read_to_string(&artifact.csv_path).unwrap();
        assert_eq!(
            text,
            "\u{feff}CNPJ,RazaoSocial,Trimestre,Ano,ValorDespesas\n123456,NA,1,2024,1500.0\n"
        );
        assert!(artifact.zip_path.ends_with("consolidado_despesas.zip"));
        assert!(artifact.zip_path.exists());
    }

    #[test]
    fn test_read_consolidated_round_trip() {
        let dir = TempDir::new().unwrap();
        let records = vec![record("1", 1, 2024, 10.5), record("2", 4, 2023, 0.01)];
        let artifact = write_consolidated(&records, dir.path()).unwrap();

        assert_eq!(read_consolidated(&artifact.csv_path).unwrap(), records);
    }

    #[test]
    fn test_read_consolidated_skips_invalid_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.csv");
        write_file(
            &path,
            "CNPJ,RazaoSocial,Trimestre,Ano,ValorDespesas\n\
             1,NA,9,2024,1.0\n\
             2,NA,1,2024,x\n\
             3,NA,1,2024,3.0\n",
        );

        let records = read_consolidated(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operator_id, "3");
    }

    #[test]
    fn test_read_consolidated_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_consolidated(&dir.path().join("nope.csv"));
        assert!(matches!(result, Err(EtlError::ConsolidatedNotFound(_))));
    }
}
