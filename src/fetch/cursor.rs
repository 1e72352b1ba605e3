use chrono::DateTime;
use duckdb::types::{TimeUnit, Value as DuckValue};
use duckdb::{Connection, Statement};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};
use crate::frame::{RowSet, Value};

/// A prepared statement scoped to one fetch. Dropping it releases the
/// statement and its result, on success and error paths alike.
pub struct Cursor<'conn> {
    stmt: Statement<'conn>,
    table: String,
}

impl<'conn> Cursor<'conn> {
    pub fn open(conn: &'conn Connection, table: &str, sql: &str) -> HarnessResult<Self> {
        let stmt = conn
            .prepare(sql)
            .map_err(|e| HarnessError::query(table, e))?;
        debug!(table, sql, "cursor opened");
        Ok(Self {
            stmt,
            table: table.to_string(),
        })
    }

    /// Execute and read every row, labelling columns positionally with `columns`.
    pub fn fetch_all(&mut self, columns: &[String]) -> HarnessResult<RowSet> {
        let mut rows = self
            .stmt
            .query([])
            .map_err(|e| HarnessError::query(&self.table, e))?;

        let width = rows.as_ref().map(|s| s.column_count()).unwrap_or(0);
        if width != columns.len() {
            return Err(HarnessError::query(
                &self.table,
                format!("returned {} columns, descriptor has {}", width, columns.len()),
            ));
        }

        let mut set = RowSet::new(columns.to_vec());
        while let Some(row) = rows.next().map_err(|e| HarnessError::query(&self.table, e))? {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                let v: DuckValue = row
                    .get(idx)
                    .map_err(|e| HarnessError::query(&self.table, e))?;
                values.push(from_duck(v));
            }
            set.push(values)
                .map_err(|e| HarnessError::query(&self.table, e))?;
        }
        Ok(set)
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        debug!(table = %self.table, "cursor released");
    }
}

fn micros(unit: TimeUnit, v: i64) -> i64 {
    match unit {
        TimeUnit::Second => v.saturating_mul(1_000_000),
        TimeUnit::Millisecond => v.saturating_mul(1_000),
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

/// Map a warehouse cell onto the harness scalar model.
pub fn from_duck(v: DuckValue) -> Value {
    match v {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::Int(i.into()),
        DuckValue::SmallInt(i) => Value::Int(i.into()),
        DuckValue::Int(i) => Value::Int(i.into()),
        DuckValue::BigInt(i) => Value::Int(i),
        DuckValue::UTinyInt(i) => Value::Int(i.into()),
        DuckValue::USmallInt(i) => Value::Int(i.into()),
        DuckValue::UInt(i) => Value::Int(i.into()),
        DuckValue::UBigInt(u) => i64::try_from(u)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Decimal(Decimal::from(u))),
        DuckValue::HugeInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(i.to_string())),
        DuckValue::Float(f) => Value::Float(f.into()),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => Value::Decimal(d),
        DuckValue::Text(s) => Value::Text(s),
        // Out-of-range dates ('infinity') stay visible as text rather than NULL.
        DuckValue::Date32(days) => DateTime::from_timestamp(i64::from(days) * 86_400, 0)
            .map(|dt| Value::Date(dt.date_naive()))
            .unwrap_or_else(|| Value::Text(format!("Date32({})", days))),
        DuckValue::Timestamp(unit, v) => DateTime::from_timestamp_micros(micros(unit, v))
            .map(|dt| Value::Timestamp(dt.naive_utc()))
            .unwrap_or_else(|| Value::Text(format!("Timestamp({:?}, {})", unit, v))),
        other => Value::Text(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn dates_map_to_calendar_values() {
        let day = NaiveDate::from_ymd_opt(2016, 9, 8).unwrap();
        let days = (day - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32;
        assert_eq!(from_duck(DuckValue::Date32(days)), Value::Date(day));
        assert_eq!(
            from_duck(DuckValue::Timestamp(TimeUnit::Second, 1_473_292_800)),
            Value::Timestamp(day.and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn out_of_range_dates_never_match_null() {
        let inf = from_duck(DuckValue::Timestamp(TimeUnit::Microsecond, i64::MAX));
        assert!(matches!(inf, Value::Text(_)));
        assert!(!inf.matches(&Value::Null));

        let far = from_duck(DuckValue::Date32(i32::MAX));
        assert!(matches!(far, Value::Text(_)));
        assert!(!far.matches(&Value::Null));
    }

    #[test]
    fn infinity_timestamp_from_the_warehouse_is_text() -> anyhow::Result<()> {
        let conn = Connection::open_in_memory()?;
        let mut cursor = Cursor::open(
            &conn,
            "t",
            "SELECT 'infinity'::TIMESTAMP AS deadline",
        )?;
        let set = cursor.fetch_all(&["deadline".to_string()])?;
        assert!(matches!(set.get(0, "deadline"), Some(Value::Text(_))));
        Ok(())
    }
}
