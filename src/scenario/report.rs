use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::{
    fmt::{Display, Write as _},
    fs,
    path::{Path, PathBuf},
};

use crate::error::HarnessError;
use crate::frame::Mismatch;

fn as_display<T: Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

/// Verdict for one output table.
#[derive(Debug, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TableResult {
    Pass,
    Fail(Mismatch),
    Error(#[serde(serialize_with = "as_display")] HarnessError),
}

impl TableResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, TableResult::Pass)
    }
}

#[derive(Debug, Serialize)]
pub struct TableReport {
    pub table: String,
    pub result: TableResult,
}

/// Step a scenario was aborted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Staging,
    Invocation,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Pass {
        tables: Vec<TableReport>,
    },
    Fail {
        tables: Vec<TableReport>,
    },
    Aborted {
        stage: Stage,
        #[serde(serialize_with = "as_display")]
        error: HarnessError,
    },
    Skipped {
        reason: String,
    },
}

impl ScenarioOutcome {
    /// Aggregate per-table results: Pass only if every table passed.
    pub fn from_tables(tables: Vec<TableReport>) -> Self {
        if tables.iter().all(|t| t.result.is_pass()) {
            ScenarioOutcome::Pass { tables }
        } else {
            ScenarioOutcome::Fail { tables }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ScenarioOutcome::Pass { .. } | ScenarioOutcome::Skipped { .. }
        )
    }

    pub fn tables(&self) -> &[TableReport] {
        match self {
            ScenarioOutcome::Pass { tables } | ScenarioOutcome::Fail { tables } => tables,
            _ => &[],
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableResult> {
        self.tables()
            .iter()
            .find(|t| t.table == name)
            .map(|t| &t.result)
    }
}

#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub date: NaiveDate,
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: ScenarioOutcome,
}

impl ScenarioReport {
    /// Human-readable verdict, one line per table.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "{} --date {}: ", self.task, self.date);
        match &self.outcome {
            ScenarioOutcome::Pass { .. } => out.push_str("PASS"),
            ScenarioOutcome::Fail { .. } => out.push_str("FAIL"),
            ScenarioOutcome::Aborted { stage, error } => {
                let _ = write!(out, "ABORTED during {:?}: {}", stage, error);
            }
            ScenarioOutcome::Skipped { reason } => {
                let _ = write!(out, "SKIPPED ({})", reason);
            }
        }
        for t in self.outcome.tables() {
            let line = match &t.result {
                TableResult::Pass => "pass".to_string(),
                TableResult::Fail(m) => format!("FAIL {}", m),
                TableResult::Error(e) => format!("ERROR {}", e),
            };
            let _ = write!(out, "\n  {:<20} {}", t.table, line);
        }
        out
    }

    /// Write `<dir>/<date>_<finished>.json` and return its path.
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating report directory {}", dir.display()))?;
        let path = dir.join(format!(
            "{}_{}.json",
            self.date.format("%Y-%m-%d"),
            self.finished_at.format("%Y%m%dT%H%M%S%.3fZ")
        ));
        let file =
            fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(file, self).context("serializing scenario report")?;
        Ok(path)
    }
}
