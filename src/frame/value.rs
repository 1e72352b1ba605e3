use chrono::{NaiveDate, NaiveDateTime, SubsecRound};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;
use std::{cmp::Ordering, fmt};

/// A single typed cell, either fetched from the warehouse or parsed from a fixture.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Decimal(_) | Value::Float(_))
    }

    /// Numeric view of the cell. Text is accepted when it parses as a number.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            Value::Float(f) => Decimal::from_f64(*f),
            Value::Text(s) => s.trim().parse::<Decimal>().ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            other => other.as_decimal().and_then(|d| d.to_f64()),
        }
    }

    fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::Text(s) => NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                }),
            _ => None,
        }
    }

    /// Type-aware equality of an actual cell against an expected fixture cell.
    ///
    /// Dates compare at the unit of the expected value: whole days for `Date`,
    /// whole seconds for `Timestamp`.
    pub fn matches(&self, expected: &Value) -> bool {
        match (self, expected) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,

            (actual, Value::Date(e)) => actual.as_datetime().map(|a| a.date()) == Some(*e),
            (actual, Value::Timestamp(e)) => {
                actual.as_datetime().map(|a| a.trunc_subsecs(0)) == Some(e.trunc_subsecs(0))
            }

            (Value::Float(_), other) | (other, Value::Float(_))
                if other.is_numeric() || matches!(other, Value::Text(_)) =>
            {
                match (self.as_f64(), expected.as_f64()) {
                    (Some(a), Some(e)) => floats_equal(a, e),
                    _ => false,
                }
            }
            (a, e) if a.is_numeric() || e.is_numeric() => {
                match (a.as_decimal(), e.as_decimal()) {
                    (Some(a), Some(e)) => a == e,
                    _ => false,
                }
            }

            (Value::Text(a), Value::Text(e)) => a == e,
            (Value::Bool(a), Value::Bool(e)) => a == e,
            _ => false,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Decimal(_) | Value::Float(_) => 2,
            Value::Date(_) | Value::Timestamp(_) => 3,
            Value::Text(_) => 4,
        }
    }

    /// Total order used for post-fetch sorting. Nulls sort first.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) if a.is_numeric() => match (a.as_decimal(), b.as_decimal()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => a
                    .as_f64()
                    .partial_cmp(&b.as_f64())
                    .unwrap_or(Ordering::Equal),
            },
            (a, b) => a.as_datetime().cmp(&b.as_datetime()),
        }
    }
}

fn floats_equal(a: f64, e: f64) -> bool {
    if a == e {
        return true;
    }
    let scale = a.abs().max(e.abs()).max(1.0);
    (a - e).abs() <= f64::EPSILON * 4.0 * scale
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
