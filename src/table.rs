// src/table.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};
use crate::frame::DateFormat;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// True for bare SQL identifiers that are safe to splice into a query.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// How fetched rows are put into a deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ordering {
    /// `ORDER BY` these keys, ascending, in the query itself.
    Query(Vec<String>),
    /// `SELECT *` and sort both sides in memory by this column.
    PostFetch(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateColumn {
    pub name: String,
    pub format: DateFormat,
}

/// A warehouse output table under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<String>,
    pub ordering: Ordering,
    #[serde(default)]
    pub date_columns: Vec<DateColumn>,
}

impl TableDescriptor {
    /// A descriptor ordered by its first column until told otherwise.
    pub fn new(name: &str, columns: &[&str]) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        Self {
            name: name.to_string(),
            ordering: Ordering::Query(columns.iter().take(1).cloned().collect()),
            columns,
            date_columns: Vec::new(),
        }
    }

    pub fn order_by(mut self, keys: &[&str]) -> Self {
        self.ordering = Ordering::Query(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn sort_after_fetch(mut self, column: &str) -> Self {
        self.ordering = Ordering::PostFetch(column.to_string());
        self
    }

    pub fn with_dates(mut self, format: DateFormat, columns: &[&str]) -> Self {
        self.date_columns.extend(columns.iter().map(|c| DateColumn {
            name: c.to_string(),
            format,
        }));
        self
    }

    pub fn date_format(&self, column: &str) -> Option<DateFormat> {
        self.date_columns
            .iter()
            .find(|d| d.name == column)
            .map(|d| d.format)
    }

    pub fn sort_keys(&self) -> Vec<String> {
        match &self.ordering {
            Ordering::Query(keys) => keys.clone(),
            Ordering::PostFetch(col) => vec![col.clone()],
        }
    }

    /// Every name must be an identifier, and sort keys and date columns must be columns.
    pub fn validate(&self) -> HarnessResult<()> {
        let bad = |what: &str, name: &str| {
            HarnessError::Config(format!("table {}: invalid {} {:?}", self.name, what, name))
        };
        if !is_identifier(&self.name) {
            return Err(bad("table name", &self.name));
        }
        if self.columns.is_empty() {
            return Err(HarnessError::Config(format!("table {}: no columns", self.name)));
        }
        for col in &self.columns {
            if !is_identifier(col) {
                return Err(bad("column", col));
            }
        }
        if let Ordering::Query(keys) = &self.ordering {
            if keys.is_empty() {
                return Err(HarnessError::Config(format!(
                    "table {}: query ordering needs at least one key",
                    self.name
                )));
            }
        }
        for key in self.sort_keys() {
            if !self.columns.contains(&key) {
                return Err(bad("sort key", &key));
            }
        }
        for d in &self.date_columns {
            if !self.columns.contains(&d.name) {
                return Err(bad("date column", &d.name));
            }
        }
        Ok(())
    }
}
