//! Sequential batch pipeline.
//!
//! Stages hand off only through artifacts on disk: the consolidation stage
//! writes `consolidado_despesas.csv`, and the transform stage reads it back
//! before enriching and aggregating. Each stage finishes its output before
//! the next one starts.

use std::path::{Path, PathBuf};

use etl_core::error::Result;
use etl_core::models::AggregateRow;
use etl_core::period::PeriodOrder;
use etl_data::aggregator::{read_aggregate, write_aggregate, ExpenseAggregator, AGGREGATE_STEM};
use etl_data::consolidator::{consolidate, read_consolidated, write_consolidated, CONSOLIDATED_STEM};
use etl_data::enricher::enrich;
use etl_data::registry::load_registry;
use etl_data::summary::{expenses_by_state, operator_history, QuarterTotal, StateTotal};
use etl_data::writer::Artifact;
use serde::Serialize;
use tracing::info;

use crate::report::RunReport;

// ── PipelineOptions ───────────────────────────────────────────────────────────

/// Paths and ordering for one run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory holding the `<quarter>T<year>` folders.
    pub input_dir: PathBuf,
    /// Operator registry file.
    pub registry: PathBuf,
    /// Directory receiving every artifact.
    pub output_dir: PathBuf,
    pub period_order: PeriodOrder,
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// The ETL pipeline over one set of options.
pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    /// Consolidate, then enrich and aggregate.
    pub fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::start("run");
        self.consolidate_into(&mut report)?;
        self.transform_into(&mut report)?;
        report.finish();
        Ok(report)
    }

    /// Ingest the period folders and write the consolidated artifact.
    pub fn consolidate(&self) -> Result<RunReport> {
        let mut report = RunReport::start("consolidate");
        self.consolidate_into(&mut report)?;
        report.finish();
        Ok(report)
    }

    /// Enrich and aggregate an existing consolidated artifact.
    pub fn transform(&self) -> Result<RunReport> {
        let mut report = RunReport::start("transform");
        self.transform_into(&mut report)?;
        report.finish();
        Ok(report)
    }

    /// Where the consolidated CSV lives for these options.
    pub fn consolidated_artifact(&self) -> Artifact {
        Artifact::in_dir(&self.options.output_dir, CONSOLIDATED_STEM)
    }

    /// Where the aggregate CSV lives for these options.
    pub fn aggregate_artifact(&self) -> Artifact {
        Artifact::in_dir(&self.options.output_dir, AGGREGATE_STEM)
    }

    // ── Private implementation ────────────────────────────────────────────

    fn consolidate_into(&self, report: &mut RunReport) -> Result<()> {
        info!(
            "Consolidating period folders under {} ({} order)",
            self.options.input_dir.display(),
            self.options.period_order
        );
        let consolidation = consolidate(&self.options.input_dir, self.options.period_order)?;
        let artifact = write_consolidated(&consolidation.records, &self.options.output_dir)?;

        report.periods = consolidation.periods;
        report.ingest = consolidation.stats;
        report.consolidated_records = consolidation.records.len();
        report.artifacts.push(artifact);
        Ok(())
    }

    fn transform_into(&self, report: &mut RunReport) -> Result<()> {
        let consolidated = self.consolidated_artifact();
        let records = read_consolidated(&consolidated.csv_path)?;
        report.consolidated_records = records.len();

        let registry = load_registry(&self.options.registry)?;
        let (enriched, enrichment) = enrich(records, &registry);

        let rows = ExpenseAggregator::aggregate(&enriched);
        info!("Aggregated {} records into {} groups", enriched.len(), rows.len());
        let artifact = write_aggregate(&rows, &self.options.output_dir)?;

        report.enrichment = Some(enrichment);
        report.aggregate_groups = rows.len();
        report.artifacts.push(artifact);
        Ok(())
    }
}

// ── Summary ───────────────────────────────────────────────────────────────────

/// Read-only view over the artifacts of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Largest operator groups, in artifact order.
    pub top_operators: Vec<AggregateRow>,
    /// Largest expense totals per state.
    pub states: Vec<StateTotal>,
    /// Quarterly history of the requested operator, when one was given.
    pub history: Option<Vec<QuarterTotal>>,
}

/// Build the state summary from the aggregate artifact in `output_dir`, and
/// the quarterly history of `operator` from the consolidated artifact.
pub fn summarize(output_dir: &Path, top: usize, operator: Option<&str>) -> Result<Summary> {
    let aggregate = Artifact::in_dir(output_dir, AGGREGATE_STEM);
    let rows = read_aggregate(&aggregate.csv_path)?;
    let states = expenses_by_state(&rows, top);
    let top_operators = rows.into_iter().take(top).collect();

    let history = match operator {
        Some(id) => {
            let consolidated = Artifact::in_dir(output_dir, CONSOLIDATED_STEM);
            let records = read_consolidated(&consolidated.csv_path)?;
            Some(operator_history(&records, id))
        }
        None => None,
    };

    Ok(Summary {
        top_operators,
        states,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_core::error::EtlError;
    use tempfile::TempDir;

    fn options(root: &Path) -> PipelineOptions {
        PipelineOptions {
            input_dir: root.join("input"),
            registry: root.join("cadop.csv"),
            output_dir: root.join("output"),
            period_order: PeriodOrder::Lexicographic,
        }
    }

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_consolidate_only_writes_consolidated_artifact() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path());
        write(
            &opts.input_dir.join("1T2024").join("a.csv"),
            "REG_ANS;VL_SALDO_FINAL\n1;10,00\n",
        );

        let pipeline = Pipeline::new(opts);
        let report = pipeline.consolidate().unwrap();

        assert_eq!(report.consolidated_records, 1);
        assert_eq!(report.artifacts.len(), 1);
        assert!(pipeline.consolidated_artifact().zip_path.exists());
        assert!(!pipeline.aggregate_artifact().csv_path.exists());
    }

    #[test]
    fn test_transform_requires_consolidated_artifact() {
        let tmp = TempDir::new().unwrap();
        let result = Pipeline::new(options(tmp.path())).transform();
        assert!(matches!(result, Err(EtlError::ConsolidatedNotFound(_))));
    }

    #[test]
    fn test_run_fails_without_registry() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path());
        write(
            &opts.input_dir.join("1T2024").join("a.csv"),
            "REG_ANS;VL_SALDO_FINAL\n1;10,00\n",
        );

        let pipeline = Pipeline::new(opts);
        let result = pipeline.run();
        assert!(matches!(result, Err(EtlError::RegistryNotFound(_))));
        assert!(!pipeline.aggregate_artifact().csv_path.exists());
    }

    #[test]
    fn test_run_fails_without_data() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path());
        std::fs::create_dir_all(opts.input_dir.join("1T2024")).unwrap();

        let result = Pipeline::new(opts).run();
        assert!(matches!(result, Err(EtlError::NoValidData(_))));
    }

    #[test]
    fn test_summarize_top_limits_operators_and_states() {
        let tmp = TempDir::new().unwrap();
        let row = |name: &str, state: &str, total: f64| AggregateRow {
            legal_name: name.to_string(),
            state_code: state.to_string(),
            total_expenses: total,
            mean_expense_per_period: total,
            std_dev_expense: 0.0,
        };
        let rows = vec![row("A", "SP", 300.0), row("B", "RJ", 200.0), row("C", "SP", 100.0)];
        write_aggregate(&rows, tmp.path()).unwrap();

        let summary = summarize(tmp.path(), 1, None).unwrap();
        assert_eq!(summary.top_operators, vec![rows[0].clone()]);
        assert_eq!(summary.states.len(), 1);
        assert_eq!(summary.states[0].state_code, "SP");
        assert_eq!(summary.states[0].total, 400.0);
        assert!(summary.history.is_none());
    }

    #[test]
    fn test_summarize_requires_aggregate() {
        let tmp = TempDir::new().unwrap();
        let result = summarize(tmp.path(), 10, None);
        assert!(matches!(result, Err(EtlError::AggregateNotFound(_))));
    }
}
