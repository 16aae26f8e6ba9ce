use serde::{Deserialize, Serialize};

use crate::cnpj::SENTINEL_CNPJ;
use crate::period::Period;

// ── Column names and sentinels ─────────────────────────────────────────────────

/// Account-code column of the quarterly ledgers.
pub const LEDGER_ACCOUNT_COLUMN: &str = "CD_CONTA_CONTABIL";
/// Operator registry number column of the quarterly ledgers.
pub const LEDGER_OPERATOR_COLUMN: &str = "REG_ANS";
/// Closing-balance column of the quarterly ledgers.
pub const LEDGER_BALANCE_COLUMN: &str = "VL_SALDO_FINAL";
/// Account subtree holding event/claims expense accounts.
pub const EXPENSE_ACCOUNT_PREFIX: &str = "411";

/// Registry (CADOP) columns.
pub const REGISTRY_ID_COLUMN: &str = "REGISTRO_OPERADORA";
pub const REGISTRY_CNPJ_COLUMN: &str = "CNPJ";
pub const REGISTRY_NAME_COLUMN: &str = "Razao_Social";
pub const REGISTRY_MODALITY_COLUMN: &str = "Modalidade";
pub const REGISTRY_STATE_COLUMN: &str = "UF";

/// Header of the consolidated artifact.
pub const CONSOLIDATED_HEADER: [&str; 5] = [
    "CNPJ",
    "RazaoSocial",
    "Trimestre",
    "Ano",
    "ValorDespesas",
];
/// Header of the aggregate artifact.
pub const AGGREGATE_HEADER: [&str; 5] = [
    "RazaoSocial",
    "UF",
    "TotalDespesas",
    "MediaTrimestral",
    "DesvioPadrao",
];

/// Legal-name placeholder written by the consolidation stage, before any
/// registry lookup has happened.
pub const UNRESOLVED_NAME: &str = "NA";
/// Legal name given to records with no registry match.
pub const UNIDENTIFIED_OPERATOR_NAME: &str = "Operadora Não Identificada";
/// State code given to records with no registry match.
pub const UNIDENTIFIED_STATE: &str = "N/I";

// ── Records ───────────────────────────────────────────────────────────────────

/// One operator's claims expense for one quarter.
///
/// `expense_amount` is always strictly positive; rows with a zero or negative
/// balance never become records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodExpenseRecord {
    /// Registry number as it appeared in the ledger (trimmed, unvalidated).
    pub operator_id: String,
    pub period: Period,
    pub expense_amount: f64,
}

/// One operator as listed in the external registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Registry number, the join key against the ledgers.
    pub registry_id: String,
    /// National company identifier, when the registry provides one.
    pub cnpj: Option<String>,
    pub legal_name: String,
    pub modality: String,
    pub state_code: String,
}

/// A consolidated record after the registry lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub record: PeriodExpenseRecord,
    /// Registry CNPJ when matched, otherwise the record's own identifier,
    /// otherwise [`SENTINEL_CNPJ`].
    pub resolved_id: String,
    pub legal_name: String,
    pub state_code: String,
    /// `true` when the record found a registry entry.
    pub matched: bool,
    /// Check-digit result for `resolved_id`. Audit signal only.
    pub identifier_valid: bool,
}

impl EnrichedRecord {
    /// Resolve a record against an optional registry match.
    ///
    /// A miss keeps the record and fills the identity with the
    /// "not identified" sentinels instead of dropping it.
    pub fn resolve(record: PeriodExpenseRecord, entry: Option<&RegistryEntry>) -> Self {
        let own_id = record.operator_id.trim();
        let fallback_id = if own_id.is_empty() {
            SENTINEL_CNPJ.to_string()
        } else {
            own_id.to_string()
        };

        let (resolved_id, legal_name, state_code) = match entry {
            Some(e) => (
                e.cnpj
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .unwrap_or(fallback_id),
                non_empty_or(&e.legal_name, UNIDENTIFIED_OPERATOR_NAME),
                non_empty_or(&e.state_code, UNIDENTIFIED_STATE),
            ),
            None => (
                fallback_id,
                UNIDENTIFIED_OPERATOR_NAME.to_string(),
                UNIDENTIFIED_STATE.to_string(),
            ),
        };

        let identifier_valid = crate::cnpj::is_valid(&resolved_id);
        Self {
            record,
            resolved_id,
            legal_name,
            state_code,
            matched: entry.is_some(),
            identifier_valid,
        }
    }
}

/// Per-identity expense statistics, the pipeline's final output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub legal_name: String,
    pub state_code: String,
    pub total_expenses: f64,
    pub mean_expense_per_period: f64,
    /// Sample standard deviation; `0` for single-observation groups.
    pub std_dev_expense: f64,
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
