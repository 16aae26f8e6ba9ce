//! Run report collected while the pipeline executes.

use chrono::{DateTime, Utc};
use etl_data::consolidator::{PeriodStatus, PeriodSummary};
use etl_data::enricher::EnrichmentReport;
use etl_data::reader::IngestStats;
use etl_data::writer::Artifact;
use serde::Serialize;
use tracing::info;

/// Counters and outputs of one pipeline invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Mode that produced this report (`run`, `consolidate`, `transform`).
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    /// One line per period folder, in consolidation order.
    pub periods: Vec<PeriodSummary>,
    pub ingest: IngestStats,
    pub consolidated_records: usize,
    pub enrichment: Option<EnrichmentReport>,
    pub aggregate_groups: usize,
    pub artifacts: Vec<Artifact>,
}

impl RunReport {
    pub fn start(mode: &str) -> Self {
        Self {
            mode: mode.to_string(),
            started_at: Utc::now(),
            elapsed_seconds: 0.0,
            periods: Vec::new(),
            ingest: IngestStats::default(),
            consolidated_records: 0,
            enrichment: None,
            aggregate_groups: 0,
            artifacts: Vec::new(),
        }
    }

    /// Stamp the elapsed time.
    pub fn finish(&mut self) {
        let elapsed = Utc::now() - self.started_at;
        self.elapsed_seconds = elapsed.num_milliseconds() as f64 / 1000.0;
    }

    /// Number of period folders that contributed records.
    pub fn periods_loaded(&self) -> usize {
        self.periods
            .iter()
            .filter(|p| p.status == PeriodStatus::Loaded)
            .count()
    }

    /// Emit the report through `tracing`.
    pub fn log(&self) {
        if !self.periods.is_empty() {
            info!(
                periods = self.periods.len(),
                loaded = self.periods_loaded(),
                rows_read = self.ingest.rows_read,
                malformed = self.ingest.rows_malformed,
                coerced = self.ingest.amounts_coerced,
                kept = self.ingest.records_kept,
                "ingestion summary"
            );
        }
        if let Some(enrichment) = &self.enrichment {
            info!(
                records = enrichment.records,
                matched = enrichment.matched,
                unmatched = enrichment.unmatched,
                invalid_identifiers = enrichment.invalid_identifiers,
                "enrichment summary"
            );
        }
        for artifact in &self.artifacts {
            info!("Artifact: {}", artifact.zip_path.display());
        }
        info!(
            "{} finished in {:.2}s ({} consolidated records, {} aggregate groups)",
            self.mode, self.elapsed_seconds, self.consolidated_records, self.aggregate_groups
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_is_empty() {
        let report = RunReport::start("run");
        assert_eq!(report.mode, "run");
        assert_eq!(report.periods_loaded(), 0);
        assert!(report.enrichment.is_none());
    }

    #[test]
    fn test_finish_sets_non_negative_elapsed() {
        let mut report = RunReport::start("consolidate");
        report.finish();
        assert!(report.elapsed_seconds >= 0.0);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = RunReport::start("transform");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "transform");
        assert!(json["enrichment"].is_null());
        assert!(json["started_at"].is_string());
    }
}
