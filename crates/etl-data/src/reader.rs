//! Period discovery and quarterly ledger parsing.
//!
//! Finds the `<quarter>T<year>` folders under the input directory, picks the
//! authoritative ledger file inside each, and turns its rows into
//! [`PeriodExpenseRecord`]s.

use std::fs::File;
use std::path::{Path, PathBuf};

use etl_core::error::{EtlError, Result};
use etl_core::formatting::parse_amount;
use etl_core::models::{
    PeriodExpenseRecord, EXPENSE_ACCOUNT_PREFIX, LEDGER_ACCOUNT_COLUMN, LEDGER_BALANCE_COLUMN,
    LEDGER_OPERATOR_COLUMN,
};
use etl_core::period::{Period, PeriodOrder};
use etl_core::text::strip_bom;
use serde::Serialize;
use tracing::{debug, warn};

// ── Public types ──────────────────────────────────────────────────────────────

/// A period folder recognised by its name.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSource {
    pub dir_name: String,
    pub period: Period,
    pub dir: PathBuf,
}

/// Row counters for one or more ledger files.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    /// Data lines seen (excluding the header).
    pub rows_read: usize,
    /// Lines dropped for wrong field count, bad UTF-8 or CSV framing.
    pub rows_malformed: usize,
    /// Lines outside the expense account subtree.
    pub rows_filtered: usize,
    /// Balances that could not be parsed and were taken as zero.
    pub amounts_coerced: usize,
    /// Lines dropped for a zero or negative balance.
    pub rows_non_positive: usize,
    /// Records emitted.
    pub records_kept: usize,
}

impl IngestStats {
    /// Add another file's counters to these.
    pub fn merge(&mut self, other: &IngestStats) {
        self.rows_read += other.rows_read;
        self.rows_malformed += other.rows_malformed;
        self.rows_filtered += other.rows_filtered;
        self.amounts_coerced += other.amounts_coerced;
        self.rows_non_positive += other.rows_non_positive;
        self.records_kept += other.records_kept;
    }
}

/// Records parsed from one period folder.
#[derive(Debug, Clone)]
pub struct PeriodBatch {
    pub source: PeriodSource,
    /// The ledger that was read, `None` when the folder holds no file.
    pub file: Option<PathBuf>,
    pub records: Vec<PeriodExpenseRecord>,
    pub stats: IngestStats,
}

impl PeriodBatch {
    /// `true` when the period contributed nothing.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// List the period folders directly under `input_dir`, in `order`.
///
/// Entries whose name is not exactly `<1-4>T<yyyy>`, and plain files, are
/// ignored.
pub fn discover_periods(input_dir: &Path, order: PeriodOrder) -> Result<Vec<PeriodSource>> {
    if !input_dir.is_dir() {
        return Err(EtlError::InputDirNotFound(input_dir.to_path_buf()));
    }

    let mut found: Vec<(String, Period, PathBuf)> = walkdir::WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            match Period::from_dir_name(&name) {
                Some(period) => Some((name, period, entry.into_path())),
                None => {
                    debug!("Ignoring directory {}: not a period folder", name);
                    None
                }
            }
        })
        .collect();

    order.sort(&mut found);

    Ok(found
        .into_iter()
        .map(|(dir_name, period, dir)| PeriodSource {
            dir_name,
            period,
            dir,
        })
        .collect())
}

/// The ledger file of a period folder: the first regular file by name.
///
/// Returns `None` when the folder holds no file.
pub fn find_ledger_file(dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();

    if files.len() > 1 {
        debug!(
            "{} holds {} files; using {}",
            dir.display(),
            files.len(),
            files[0].display()
        );
    }

    if files.is_empty() {
        None
    } else {
        Some(files.swap_remove(0))
    }
}

/// Parse the ledger of one period folder.
///
/// A folder without any file yields an empty batch. A ledger lacking the
/// operator or balance column is an error for the caller to report.
pub fn ingest_period(source: &PeriodSource) -> Result<PeriodBatch> {
    let Some(file) = find_ledger_file(&source.dir) else {
        return Ok(PeriodBatch {
            source: source.clone(),
            file: None,
            records: Vec::new(),
            stats: IngestStats::default(),
        });
    };

    let (records, stats) = parse_ledger(&file, source.period)?;
    Ok(PeriodBatch {
        source: source.clone(),
        file: Some(file),
        records,
        stats,
    })
}

/// Parse a `;`-delimited ledger with `,` decimals and `.` thousands into
/// expense records.
///
/// * Malformed lines are skipped and counted.
/// * With an account-code column only codes under `411` are kept.
/// * Unparseable balances count as zero; non-positive balances are dropped.
pub fn parse_ledger(
    path: &Path,
    period: Period,
) -> Result<(Vec<PeriodExpenseRecord>, IngestStats)> {
    let file = File::open(path).map_err(|source| EtlError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(file);

    let headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| strip_bom(&String::from_utf8_lossy(h)).trim().to_string())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let missing = |name: &str| EtlError::MissingColumn {
        path: path.to_path_buf(),
        column: name.to_string(),
    };
    let operator_idx =
        column(LEDGER_OPERATOR_COLUMN).ok_or_else(|| missing(LEDGER_OPERATOR_COLUMN))?;
    let balance_idx =
        column(LEDGER_BALANCE_COLUMN).ok_or_else(|| missing(LEDGER_BALANCE_COLUMN))?;
    let account_idx = column(LEDGER_ACCOUNT_COLUMN);
    if account_idx.is_none() {
        debug!(
            "{} has no {} column; keeping every row",
            path.display(),
            LEDGER_ACCOUNT_COLUMN
        );
    }

    let mut records = Vec::new();
    let mut stats = IngestStats::default();

    for (line_no, result) in rdr.byte_records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                stats.rows_read += 1;
                stats.rows_malformed += 1;
                if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                    warn!("Stopped reading {}: {}", path.display(), e);
                    break;
                }
                debug!("Skipping malformed line in {}: {}", path.display(), e);
                continue;
            }
        };
        stats.rows_read += 1;

        if record.len() != headers.len() {
            stats.rows_malformed += 1;
            debug!(
                "Skipping line {} of {}: {} fields, expected {}",
                line_no + 2,
                path.display(),
                record.len(),
                headers.len()
            );
            continue;
        }

        let field = |idx: usize| std::str::from_utf8(record.get(idx).unwrap_or_default());
        let (Ok(operator), Ok(balance)) = (field(operator_idx), field(balance_idx)) else {
            stats.rows_malformed += 1;
            debug!("Skipping line {} of {}: invalid UTF-8", line_no + 2, path.display());
            continue;
        };

        if let Some(idx) = account_idx {
            match field(idx) {
                Ok(code) if code.trim().starts_with(EXPENSE_ACCOUNT_PREFIX) => {}
                Ok(_) => {
                    stats.rows_filtered += 1;
                    continue;
                }
                Err(_) => {
                    stats.rows_malformed += 1;
                    continue;
                }
            }
        }

        let amount = match parse_amount(balance) {
            Some(v) => v,
            None => {
                stats.amounts_coerced += 1;
                0.0
            }
        };
        if amount <= 0.0 {
            stats.rows_non_positive += 1;
            continue;
        }

        records.push(PeriodExpenseRecord {
            operator_id: operator.trim().to_string(),
            period,
            expense_amount: amount,
        });
    }

    stats.records_kept = records.len();

    debug!(
        "File {}: {} read, {} malformed, {} filtered, {} coerced, {} non-positive, {} kept",
        path.display(),
        stats.rows_read,
        stats.rows_malformed,
        stats.rows_filtered,
        stats.amounts_coerced,
        stats.rows_non_positive,
        stats.records_kept,
    );

    Ok((records, stats))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
