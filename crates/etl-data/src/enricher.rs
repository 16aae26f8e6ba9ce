//! Left join of consolidated records against the operator registry.

use etl_core::models::{EnrichedRecord, PeriodExpenseRecord};
use serde::Serialize;
use tracing::{info, warn};

use crate::registry::Registry;

/// Join outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichmentReport {
    pub records: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Records whose resolved identifier fails the CNPJ check digits.
    pub invalid_identifiers: usize,
}

/// Attach a registry identity to every record.
///
/// Records without a registry match are kept with the "not identified"
/// sentinels, so the output always has one record per input record.
pub fn enrich(
    records: Vec<PeriodExpenseRecord>,
    registry: &Registry,
) -> (Vec<EnrichedRecord>, EnrichmentReport) {
    let mut report = EnrichmentReport::default();

    let enriched: Vec<EnrichedRecord> = records
        .into_iter()
        .map(|record| {
            let entry = registry.lookup(&record.operator_id);
            let enriched = EnrichedRecord::resolve(record, entry);

            report.records += 1;
            if enriched.matched {
                report.matched += 1;
            } else {
                report.unmatched += 1;
            }
            if !enriched.identifier_valid {
                report.invalid_identifiers += 1;
            }
            enriched
        })
        .collect();

    if report.unmatched > 0 {
        warn!(
            "{} of {} records have no registry match",
            report.unmatched, report.records
        );
    }
    info!(
        "Enriched {} records: {} matched, {} unmatched, {} invalid identifiers",
        report.records, report.matched, report.unmatched, report.invalid_identifiers
    );

    (enriched, report)
}
