//! Dashboard-style summaries over the pipeline's artifacts.

use std::collections::BTreeMap;

use etl_core::formatting::{normalize_key, round2};
use etl_core::models::{AggregateRow, PeriodExpenseRecord, UNIDENTIFIED_STATE};
use etl_core::period::Period;
use serde::Serialize;

/// Expense total for one state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTotal {
    pub state_code: String,
    pub total: f64,
}

/// Expense total for one operator in one quarter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterTotal {
    pub period: Period,
    pub total: f64,
}

/// Sum aggregate totals per state, largest first, keeping the top `limit`.
///
/// Rows without a state, or with the "not identified" sentinel, are left out.
pub fn expenses_by_state(rows: &[AggregateRow], limit: usize) -> Vec<StateTotal> {
    let mut by_state: BTreeMap<&str, f64> = BTreeMap::new();
    for row in rows {
        let state = row.state_code.trim();
        if state.is_empty() || state == UNIDENTIFIED_STATE {
            continue;
        }
        *by_state.entry(state).or_insert(0.0) += row.total_expenses;
    }

    let mut totals: Vec<StateTotal> = by_state
        .into_iter()
        .map(|(state, total)| StateTotal {
            state_code: state.to_string(),
            total: round2(total),
        })
        .collect();
    totals.sort_by(|a, b| b.total.total_cmp(&a.total));
    totals.truncate(limit);
    totals
}

/// Quarterly expense totals of one operator, newest quarter first.
///
/// `operator_id` is compared on its normalized key, so padding and
/// surrounding whitespace do not matter.
pub fn operator_history(records: &[PeriodExpenseRecord], operator_id: &str) -> Vec<QuarterTotal> {
    let key = normalize_key(operator_id);
    let mut by_period: BTreeMap<Period, f64> = BTreeMap::new();
    for r in records.iter().filter(|r| normalize_key(&r.operator_id) == key) {
        *by_period.entry(r.period).or_insert(0.0) += r.expense_amount;
    }

    by_period
        .into_iter()
        .rev()
        .map(|(period, total)| QuarterTotal {
            period,
            total: round2(total),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(uf: &str, total: f64) -> AggregateRow {
        AggregateRow {
            legal_name: format!("OP {}", uf),
            state_code: uf.to_string(),
            total_expenses: total,
            mean_expense_per_period: total,
            std_dev_expense: 0.0,
        }
    }

    fn record(id: &str, quarter: u8, year: u16, amount: f64) -> PeriodExpenseRecord {
        PeriodExpenseRecord {
            operator_id: id.to_string(),
            period: Period::new(quarter, year).unwrap(),
            expense_amount: amount,
        }
    }

    #[test]
    fn test_expenses_by_state_sums_and_excludes_sentinel() {
        let rows = vec![
            row("SP", 100.0),
            row("RJ", 300.0),
            row("SP", 250.0),
            row("N/I", 1_000.0),
            row("", 5_000.0),
        ];
        let totals = expenses_by_state(&rows, 10);

        assert_eq!(
            totals,
            vec![
                StateTotal {
                    state_code: "SP".to_string(),
                    total: 350.0
                },
                StateTotal {
                    state_code: "RJ".to_string(),
                    total: 300.0
                },
            ]
        );
    }

    #[test]
    fn test_expenses_by_state_respects_limit() {
        let rows = vec![row("SP", 3.0), row("RJ", 2.0), row("MG", 1.0)];
        let totals = expenses_by_state(&rows, 2);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[1].state_code, "RJ");
    }

    #[test]
    fn test_operator_history_newest_first() {
        let records = vec![
            record("312345", 4, 2023, 10.0),
            record("312345", 1, 2024, 20.0),
            record("0312345", 1, 2024, 5.0),
            record("999999", 2, 2024, 99.0),
        ];
        let history = operator_history(&records, " 312345 ");

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].period, Period::new(1, 2024).unwrap());
        assert_eq!(history[0].total, 25.0);
        assert_eq!(history[1].period, Period::new(4, 2023).unwrap());
    }

    #[test]
    fn test_operator_history_unknown_operator() {
        let records = vec![record("1", 1, 2024, 1.0)];
        assert!(operator_history(&records, "2").is_empty());
    }
}
