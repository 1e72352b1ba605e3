use serde::Serialize;
use thiserror::Error;

use super::value::Value;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("row has {actual} values, expected {expected}")]
pub struct RowWidthError {
    pub expected: usize,
    pub actual: usize,
}

/// Ordered rows of typed values under an ordered list of column names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(
        columns: Vec<String>,
        rows: impl IntoIterator<Item = Vec<Value>>,
    ) -> Result<Self, RowWidthError> {
        let mut set = Self::new(columns);
        for row in rows {
            set.push(row)?;
        }
        Ok(set)
    }

    pub fn push(&mut self, row: Vec<Value>) -> Result<(), RowWidthError> {
        if row.len() != self.columns.len() {
            return Err(RowWidthError {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Stable in-memory sort by one column. Returns `false` if the column is absent.
    pub fn sort_by_column(&mut self, column: &str) -> bool {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        self.rows.sort_by(|a, b| a[idx].sort_cmp(&b[idx]));
        true
    }

    /// Number of adjacent row pairs that are equal on all `keys`.
    /// Non-zero means the keys do not totally order this set.
    pub fn key_ties(&self, keys: &[String]) -> usize {
        let idx: Vec<usize> = keys.iter().filter_map(|k| self.column_index(k)).collect();
        if idx.is_empty() {
            return 0;
        }
        self.rows
            .windows(2)
            .filter(|pair| idx.iter().all(|&i| pair[0][i] == pair[1][i]))
            .count()
    }
}
