//! Expense statistics per operator identity.

use std::collections::BTreeMap;
use std::path::Path;

use etl_core::error::{EtlError, Result};
use etl_core::formatting::{format_decimal, parse_decimal, round2};
use etl_core::models::{AggregateRow, EnrichedRecord, AGGREGATE_HEADER};
use etl_core::text::strip_bom;
use tracing::{info, warn};

use crate::writer::Artifact;

/// File stem of the aggregate artifact.
pub const AGGREGATE_STEM: &str = "despesas_agregadas";

// ── GroupStats ────────────────────────────────────────────────────────────────

/// Expense amounts collected for one `(legal name, state)` group.
#[derive(Debug, Clone, Default)]
struct GroupStats {
    amounts: Vec<f64>,
}

impl GroupStats {
    fn total(&self) -> f64 {
        self.amounts.iter().sum()
    }

    fn mean(&self) -> f64 {
        if self.amounts.is_empty() {
            0.0
        } else {
            self.total() / self.amounts.len() as f64
        }
    }
}

// ── ExpenseAggregator ─────────────────────────────────────────────────────────

/// Stateless helper that groups enriched records by identity.
pub struct ExpenseAggregator;

impl ExpenseAggregator {
    /// Group by `(legal_name, state_code)` and compute sum, mean and sample
    /// standard deviation of the expense amounts.
    ///
    /// Groups are formed in key order, then sorted by descending total with
    /// a stable sort, so equal totals keep key order. Values are rounded to
    /// two decimal places after sorting.
    pub fn aggregate(records: &[EnrichedRecord]) -> Vec<AggregateRow> {
        // BTreeMap keeps the grouping order deterministic.
        let mut groups: BTreeMap<(&str, &str), GroupStats> = BTreeMap::new();
        for r in records {
            groups
                .entry((r.legal_name.as_str(), r.state_code.as_str()))
                .or_default()
                .amounts
                .push(r.record.expense_amount);
        }

        let mut rows: Vec<(f64, AggregateRow)> = groups
            .into_iter()
            .map(|((name, state), stats)| {
                let total = stats.total();
                let row = AggregateRow {
                    legal_name: name.to_string(),
                    state_code: state.to_string(),
                    total_expenses: round2(total),
                    mean_expense_per_period: round2(stats.mean()),
                    std_dev_expense: round2(Self::sample_std_dev(&stats.amounts)),
                };
                (total, row)
            })
            .collect();

        rows.sort_by(|a, b| b.0.total_cmp(&a.0));
        rows.into_iter().map(|(_, row)| row).collect()
    }

    /// Sample standard deviation (denominator `n - 1`).
    ///
    /// Returns `0.0` for fewer than two values, where it is undefined.
    pub fn sample_std_dev(values: &[f64]) -> f64 {
        let n = values.len();
        if n < 2 {
            return 0.0;
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (sum_sq / (n - 1) as f64).sqrt()
    }
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// Persist aggregate rows as `despesas_agregadas.csv` (`;`-delimited, BOM)
/// and its single-entry zip under `output_dir`.
pub fn write_aggregate(rows: &[AggregateRow], output_dir: &Path) -> Result<Artifact> {
    let artifact = Artifact::in_dir(output_dir, AGGREGATE_STEM);
    let lines = rows.iter().map(|r| {
        vec![
            r.legal_name.clone(),
            r.state_code.clone(),
            format_decimal(r.total_expenses),
            format_decimal(r.mean_expense_per_period),
            format_decimal(r.std_dev_expense),
        ]
    });
    artifact.write(b';', &AGGREGATE_HEADER, lines)?;
    info!("Aggregate artifact written to {}", artifact.zip_path.display());
    Ok(artifact)
}

/// Read an aggregate CSV back into rows. Rows with unparseable numbers are
/// skipped with a warning.
pub fn read_aggregate(path: &Path) -> Result<Vec<AggregateRow>> {
    if !path.is_file() {
        return Err(EtlError::AggregateNotFound(path.to_path_buf()));
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
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
    let name_idx = column(AGGREGATE_HEADER[0])?;
    let state_idx = column(AGGREGATE_HEADER[1])?;
    let total_idx = column(AGGREGATE_HEADER[2])?;
    let mean_idx = column(AGGREGATE_HEADER[3])?;
    let std_idx = column(AGGREGATE_HEADER[4])?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping unreadable row in {}: {}", path.display(), e);
                continue;
            }
        };
        let field = |idx: usize| record.get(idx).unwrap_or_default();
        let numbers = (
            parse_decimal(field(total_idx)),
            parse_decimal(field(mean_idx)),
            parse_decimal(field(std_idx)),
        );
        match numbers {
            (Some(total_expenses), Some(mean_expense_per_period), Some(std_dev_expense)) => {
                rows.push(AggregateRow {
                    legal_name: field(name_idx).to_string(),
                    state_code: field(state_idx).to_string(),
                    total_expenses,
                    mean_expense_per_period,
                    std_dev_expense,
                })
            }
            _ => warn!("Skipping invalid row in {}: {:?}", path.display(), record),
        }
    }
    Ok(rows)
}
