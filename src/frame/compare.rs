use serde::Serialize;
use std::fmt::Write as _;
use thiserror::Error;

use super::{rowset::RowSet, value::Value};

/// Why an actual row set failed to match its fixture.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    #[error("row count mismatch: actual {actual}, expected {expected}")]
    RowCount { actual: usize, expected: usize },

    #[error(
        "schema mismatch: actual [{}], expected [{}]",
        .actual.join(", "),
        .expected.join(", ")
    )]
    Schema {
        actual: Vec<String>,
        expected: Vec<String>,
    },

    #[error("value mismatch at row {row}, column {column}: actual {actual}, expected {expected}")]
    Value {
        row: usize,
        column: String,
        actual: Value,
        expected: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", content = "mismatch", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail(Mismatch),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Compare positionally aligned row sets, stopping at the first difference.
///
/// Row count is checked before column layout, then cells row by row.
pub fn compare(actual: &RowSet, expected: &RowSet) -> Verdict {
    if actual.len() != expected.len() {
        return Verdict::Fail(Mismatch::RowCount {
            actual: actual.len(),
            expected: expected.len(),
        });
    }
    if actual.columns() != expected.columns() {
        return Verdict::Fail(Mismatch::Schema {
            actual: actual.columns().to_vec(),
            expected: expected.columns().to_vec(),
        });
    }

    for (row, (a_row, e_row)) in actual.rows().iter().zip(expected.rows()).enumerate() {
        for ((column, a), e) in actual.columns().iter().zip(a_row).zip(e_row) {
            if !a.matches(e) {
                return Verdict::Fail(Mismatch::Value {
                    row,
                    column: column.clone(),
                    actual: a.clone(),
                    expected: e.clone(),
                });
            }
        }
    }
    Verdict::Pass
}

/// Render rows `row-radius ..= row+radius` of both sides for a failure log.
pub fn render_context(actual: &RowSet, expected: &RowSet, row: usize, radius: usize) -> String {
    let mut out = String::new();
    for (label, set) in [("actual", actual), ("expected", expected)] {
        let _ = writeln!(out, "{}: {}", label, set.columns().join(" | "));
        let start = row.saturating_sub(radius);
        let end = (row + radius + 1).min(set.len());
        for (i, r) in set.rows().iter().enumerate().take(end).skip(start) {
            let cells: Vec<String> = r.iter().map(|v| v.to_string()).collect();
            let marker = if i == row { ">" } else { " " };
            let _ = writeln!(out, "{}{:>4}  {}", marker, i, cells.join(" | "));
        }
    }
    out
}
