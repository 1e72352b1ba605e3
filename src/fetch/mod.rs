// src/fetch/mod.rs

pub mod cursor;

use duckdb::{AccessMode, Config, Connection};
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::frame::RowSet;
use crate::table::{is_identifier, Ordering, TableDescriptor};
use cursor::Cursor;

/// Build the deterministic query for `descriptor` in `schema`.
pub fn build_query(schema: &str, descriptor: &TableDescriptor) -> HarnessResult<String> {
    for name in [schema, descriptor.name.as_str()] {
        if !is_identifier(name) {
            return Err(HarnessError::query(
                &descriptor.name,
                format!("malformed identifier {:?}", name),
            ));
        }
    }
    match &descriptor.ordering {
        Ordering::Query(keys) => {
            for c in descriptor.columns.iter().chain(keys) {
                if !is_identifier(c) {
                    return Err(HarnessError::query(
                        &descriptor.name,
                        format!("malformed column {:?}", c),
                    ));
                }
            }
            let order: Vec<String> = keys.iter().map(|k| format!("{} ASC", k)).collect();
            Ok(format!(
                "SELECT {} FROM {}.{} ORDER BY {}",
                descriptor.columns.join(","),
                schema,
                descriptor.name,
                order.join(", ")
            ))
        }
        Ordering::PostFetch(_) => Ok(format!("SELECT * FROM {}.{}", schema, descriptor.name)),
    }
}

/// Read-side handle on the warehouse schema holding the tables under test.
///
/// Holds no connection between fetches, so the load task can take the
/// database's write lock while the harness waits on it.
#[derive(Debug, Clone)]
pub struct Warehouse {
    database: PathBuf,
    schema: String,
}

impl Warehouse {
    pub fn new(database: impl Into<PathBuf>, schema: &str) -> HarnessResult<Self> {
        if !is_identifier(schema) {
            return Err(HarnessError::Config(format!(
                "malformed schema name {:?}",
                schema
            )));
        }
        Ok(Self {
            database: database.into(),
            schema: schema.to_string(),
        })
    }

    /// Read-only connection for one fetch. Failures belong to `table`.
    fn connect(&self, table: &str) -> HarnessResult<Connection> {
        let config = Config::default()
            .access_mode(AccessMode::ReadOnly)
            .map_err(|e| HarnessError::query(table, e))?;
        let conn = Connection::open_with_flags(&self.database, config).map_err(|e| {
            HarnessError::query(table, format!("opening {}: {}", self.database.display(), e))
        })?;
        debug!(database = %self.database.display(), "connection opened");
        Ok(conn)
    }

    /// Fetch `descriptor`'s table as an ordered row set.
    ///
    /// `PostFetch` tables come back in warehouse order; the caller sorts them.
    #[instrument(level = "info", skip(self, descriptor), fields(table = %descriptor.name))]
    pub fn fetch(&self, descriptor: &TableDescriptor) -> HarnessResult<RowSet> {
        let sql = build_query(&self.schema, descriptor)?;
        let conn = self.connect(&descriptor.name)?;
        let set = {
            let mut cursor = Cursor::open(&conn, &descriptor.name, &sql)?;
            cursor.fetch_all(&descriptor.columns)?
        };

        if let Ordering::Query(keys) = &descriptor.ordering {
            let ties = set.key_ties(keys);
            if ties > 0 {
                warn!(ties, keys = ?keys, "sort keys do not totally order the rows");
            }
        }
        info!(rows = set.len(), "fetched");
        Ok(set)
    }
}
