use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};
use tracing::debug;

use super::{rowset::RowSet, value::Value};
use crate::error::{HarnessError, HarnessResult};
use crate::table::TableDescriptor;

/// Cells the fixture reader treats as missing.
const NA_VALUES: &[&str] = &["", "NaN", "nan", "NULL", "null", "NA", "N/A", "n/a", "None"];

/// How a date-bearing fixture column is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// `YYYY-MM-DD`, compared to the day.
    Date,
    /// `YYYY-MM-DD HH:MM:SS`, compared to the second.
    Timestamp,
}

impl DateFormat {
    pub fn pattern(self) -> &'static str {
        match self {
            DateFormat::Date => "%Y-%m-%d",
            DateFormat::Timestamp => "%Y-%m-%d %H:%M:%S",
        }
    }

    pub fn parse(self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            DateFormat::Date => NaiveDate::parse_from_str(raw, self.pattern())
                .ok()
                .map(Value::Date),
            DateFormat::Timestamp => NaiveDateTime::parse_from_str(raw, self.pattern())
                .ok()
                .map(Value::Timestamp),
        }
    }

    /// Inverse of [`DateFormat::parse`]; `None` for values of another kind.
    pub fn format(self, value: &Value) -> Option<String> {
        match (self, value) {
            (DateFormat::Date, Value::Date(d)) => Some(d.format(self.pattern()).to_string()),
            (DateFormat::Timestamp, Value::Timestamp(ts)) => {
                Some(ts.format(self.pattern()).to_string())
            }
            _ => None,
        }
    }
}

/// Parse a non-date fixture cell into its native scalar.
pub fn parse_cell(raw: &str) -> Value {
    if NA_VALUES.contains(&raw) {
        return Value::Null;
    }
    match raw {
        "True" | "true" => return Value::Bool(true),
        "False" | "false" => return Value::Bool(false),
        _ => {}
    }
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(d) = trimmed.parse::<Decimal>() {
        return Value::Decimal(d);
    }
    Value::Text(raw.to_string())
}

/// `<data_dir>/output/acceptance_expected_<table>.csv`
pub fn expected_path(data_dir: &Path, table: &str) -> PathBuf {
    data_dir
        .join("output")
        .join(format!("acceptance_expected_{}.csv", table))
}

/// Read the expected fixture for `descriptor` from disk.
pub fn read_expected(path: &Path, descriptor: &TableDescriptor) -> HarnessResult<RowSet> {
    let file = File::open(path).map_err(|e| HarnessError::fixture(path, e))?;
    let set = parse_expected(file, descriptor, path)?;
    debug!(table = %descriptor.name, rows = set.len(), path = %path.display(), "loaded expected fixture");
    Ok(set)
}

/// Parse an expected CSV. Column names come from the header row so that a
/// fixture whose columns drift from the descriptor surfaces as a schema mismatch.
pub fn parse_expected<R: Read>(
    reader: R,
    descriptor: &TableDescriptor,
    origin: &Path,
) -> HarnessResult<RowSet> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| HarnessError::fixture(origin, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let formats: Vec<Option<DateFormat>> = headers
        .iter()
        .map(|h| descriptor.date_format(h))
        .collect();

    let mut set = RowSet::new(headers.clone());
    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| HarnessError::fixture(origin, e))?;
        let mut row = Vec::with_capacity(record.len());
        for (idx, raw) in record.iter().enumerate() {
            let value = match formats.get(idx).copied().flatten() {
                Some(_) if NA_VALUES.contains(&raw) => Value::Null,
                Some(fmt) => fmt.parse(raw).ok_or_else(|| {
                    HarnessError::fixture(
                        origin,
                        format!(
                            "row {}: column {} value {:?} is not a {:?}",
                            line, headers[idx], raw, fmt
                        ),
                    )
                })?,
                None => parse_cell(raw),
            };
            row.push(value);
        }
        set.push(row)
            .map_err(|e| HarnessError::fixture(origin, format!("row {}: {}", line, e)))?;
    }
    Ok(set)
}
