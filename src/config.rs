use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::catalog;
use crate::error::{HarnessError, HarnessResult};
use crate::fetch::Warehouse;
use crate::scenario::{Harness, Scenario};
use crate::stage::{discover, FixtureLoader, RawDocument};
use crate::table::TableDescriptor;
use crate::task::{CommandLauncher, TaskInvoker, TaskRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// DuckDB database file holding the loaded tables.
    pub database: PathBuf,
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_schema() -> String {
    "acceptance".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub name: String,
    /// Launcher executable; the task name and `--date` follow `args`.
    pub program: String,
    pub args: Vec<String>,
    /// Extra `--key value` parameters.
    pub params: BTreeMap<String, String>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            name: catalog::TASK_NAME.to_string(),
            program: "launch-task".to_string(),
            args: Vec::new(),
            params: BTreeMap::new(),
        }
    }
}

/// Harness settings, loaded from YAML. Every field has a catalog default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub date: NaiveDate,
    /// Holds `input/` raw documents and `output/` expected CSVs.
    pub data_dir: PathBuf,
    pub warehouse_root: PathBuf,
    pub raw_namespace: String,
    /// Absent means the scenario is skipped.
    pub warehouse: Option<WarehouseConfig>,
    pub task: TaskConfig,
    /// Logical names under `data_dir/input`; empty stages every `*.json` found there.
    pub documents: Vec<String>,
    pub tables: Vec<TableDescriptor>,
    pub report_dir: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            date: catalog::default_date(),
            data_dir: PathBuf::from("tests/fixtures/catalog"),
            warehouse_root: PathBuf::from("warehouse"),
            raw_namespace: catalog::RAW_NAMESPACE.to_string(),
            warehouse: None,
            task: TaskConfig::default(),
            documents: catalog::INPUT_DOCUMENTS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            tables: catalog::tables(),
            report_dir: None,
        }
    }
}

impl HarnessConfig {
    pub fn from_yaml_str(yaml: &str) -> HarnessResult<Self> {
        let cfg: Self =
            serde_yaml::from_str(yaml).map_err(|e| HarnessError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> HarnessResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| HarnessError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.task.name.trim().is_empty() {
            return Err(HarnessError::Config("task name is empty".into()));
        }
        if self.raw_namespace.is_empty() || self.raw_namespace.contains(['/', '\\']) {
            return Err(HarnessError::Config(format!(
                "raw namespace {:?} must be a single path segment",
                self.raw_namespace
            )));
        }
        if self.tables.is_empty() {
            return Err(HarnessError::Config("no tables to validate".into()));
        }
        for t in &self.tables {
            t.validate()?;
        }
        Ok(())
    }

    fn input_documents(&self) -> HarnessResult<Vec<RawDocument>> {
        let input = self.data_dir.join("input");
        if self.documents.is_empty() {
            return discover(&input);
        }
        Ok(self
            .documents
            .iter()
            .map(|name| RawDocument::new(name.clone(), input.join(name)))
            .collect())
    }

    pub fn scenario(&self) -> HarnessResult<Scenario> {
        let mut task = TaskRequest::new(self.task.name.clone(), self.date);
        for (k, v) in &self.task.params {
            if k != "date" {
                task = task.param(k.clone(), v.clone());
            }
        }
        Ok(Scenario {
            date: self.date,
            task,
            documents: self.input_documents()?,
            data_dir: self.data_dir.clone(),
            tables: self.tables.clone(),
        })
    }

    pub fn harness(&self) -> HarnessResult<Harness> {
        let warehouse = match &self.warehouse {
            Some(w) => Some(Warehouse::new(&w.database, &w.schema)?),
            None => None,
        };
        Ok(Harness {
            loader: FixtureLoader::new(&self.warehouse_root, self.raw_namespace.clone()),
            invoker: TaskInvoker::new(Box::new(CommandLauncher::new(
                self.task.program.clone(),
                self.task.args.clone(),
            ))),
            warehouse,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Ordering;
    use tempfile::tempdir;

    #[test]
    fn defaults_describe_the_catalog_scenario() -> anyhow::Result<()> {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        let scenario = cfg.scenario()?;
        assert_eq!(
            scenario.task.to_args()[..3],
            [catalog::TASK_NAME, "--date", "2016-09-08"]
        );
        assert_eq!(scenario.documents.len(), 3);
        assert_eq!(scenario.tables.len(), 4);
        Ok(())
    }

    #[test]
    fn yaml_overrides_defaults() -> anyhow::Result<()> {
        let cfg = HarnessConfig::from_yaml_str(
            r#"
date: 2017-01-02
warehouse_root: /tmp/wh
warehouse:
  database: /tmp/wh/catalog.duckdb
task:
  program: remote-task
  args: [--wait]
  params:
    api-root: http://localhost:8008
tables:
  - name: d_course_subjects
    columns: [row_number, course_id]
    ordering: { post_fetch: row_number }
"#,
        )?;
        assert_eq!(cfg.date, NaiveDate::from_ymd_opt(2017, 1, 2).unwrap());
        assert_eq!(cfg.raw_namespace, "discovery_api_raw");
        assert_eq!(cfg.task.name, catalog::TASK_NAME);
        assert_eq!(cfg.task.program, "remote-task");
        assert_eq!(cfg.warehouse.as_ref().unwrap().schema, "acceptance");
        assert_eq!(cfg.tables[0].ordering, Ordering::PostFetch("row_number".into()));

        let args = cfg.scenario()?.task.to_args();
        assert_eq!(args[1..3], ["--date", "2017-01-02"]);
        assert_eq!(args[3..], ["--api-root", "http://localhost:8008"]);
        Ok(())
    }

    #[test]
    fn invalid_tables_are_rejected() {
        let err = HarnessConfig::from_yaml_str(
            r#"
tables:
  - name: "d_course; drop"
    columns: [course_id]
    ordering: { query: [course_id] }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
        assert!(HarnessConfig::from_yaml_str("raw_namespace: a/b").is_err());
    }

    #[test]
    fn empty_document_list_discovers_inputs() -> anyhow::Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("input"))?;
        fs::write(dir.path().join("input/programs.json"), "[]")?;
        let cfg = HarnessConfig {
            data_dir: dir.path().to_path_buf(),
            documents: vec![],
            ..HarnessConfig::default()
        };
        let docs = cfg.scenario()?.documents;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].logical_name, "programs.json");
        Ok(())
    }

    #[test]
    fn harness_without_warehouse_has_none() -> anyhow::Result<()> {
        let harness = HarnessConfig::default().harness()?;
        assert!(harness.warehouse.is_none());
        Ok(())
    }

    #[test]
    fn harness_does_not_open_the_database() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let database = dir.path().join("not-yet-loaded.duckdb");
        let cfg = HarnessConfig {
            warehouse: Some(WarehouseConfig {
                database: database.clone(),
                schema: "acceptance".into(),
            }),
            ..HarnessConfig::default()
        };
        assert!(cfg.harness()?.warehouse.is_some());
        assert!(!database.exists());

        let bad = HarnessConfig {
            warehouse: Some(WarehouseConfig {
                database,
                schema: "acceptance;drop".into(),
            }),
            ..HarnessConfig::default()
        };
        assert!(matches!(bad.harness(), Err(HarnessError::Config(_))));
        Ok(())
    }
}
