// src/scenario/mod.rs

pub mod report;
pub mod state;

use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::fetch::Warehouse;
use crate::frame::compare::{compare, render_context};
use crate::frame::{fixture, Mismatch, Verdict};
use crate::stage::{FixtureLoader, RawDocument};
use crate::table::{Ordering, TableDescriptor};
use crate::task::{TaskInvoker, TaskRequest};
pub use report::{ScenarioOutcome, ScenarioReport, Stage, TableReport, TableResult};
pub use state::ScenarioState;

/// What to stage, what to launch, and which tables to check.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub date: NaiveDate,
    pub task: TaskRequest,
    pub documents: Vec<RawDocument>,
    /// Holds `output/acceptance_expected_<table>.csv`.
    pub data_dir: PathBuf,
    pub tables: Vec<TableDescriptor>,
}

/// The external collaborators a scenario runs against.
pub struct Harness {
    pub loader: FixtureLoader,
    pub invoker: TaskInvoker,
    /// `None` skips the scenario.
    pub warehouse: Option<Warehouse>,
}

/// Fetch one table, load its fixture, align both, and compare.
pub fn validate_table(
    warehouse: &Warehouse,
    data_dir: &Path,
    descriptor: &TableDescriptor,
) -> TableResult {
    let expected_path = fixture::expected_path(data_dir, &descriptor.name);
    let mut expected = match fixture::read_expected(&expected_path, descriptor) {
        Ok(set) => set,
        Err(e) => return TableResult::Error(e),
    };
    let mut actual = match warehouse.fetch(descriptor) {
        Ok(set) => set,
        Err(e) => return TableResult::Error(e),
    };

    if let Ordering::PostFetch(column) = &descriptor.ordering {
        for (side, set) in [("actual", &mut actual), ("expected", &mut expected)] {
            if !set.sort_by_column(column) {
                warn!(table = %descriptor.name, side, column = %column, "sort column missing");
            }
        }
    }

    match compare(&actual, &expected) {
        Verdict::Pass => TableResult::Pass,
        Verdict::Fail(mismatch) => {
            if let Mismatch::Value { row, .. } = &mismatch {
                warn!(
                    table = %descriptor.name,
                    "first divergence:\n{}",
                    render_context(&actual, &expected, *row, 2)
                );
            }
            TableResult::Fail(mismatch)
        }
    }
}

/// Drive `scenario` from `Init` to `Done`.
#[instrument(level = "info", skip_all, fields(task = %scenario.task.name, date = %scenario.date))]
pub async fn run(scenario: &Scenario, harness: &Harness) -> ScenarioReport {
    let started_at = Utc::now();
    let mut state = ScenarioState::Init;
    loop {
        let from = state.name();
        state = state.advance(scenario, harness).await;
        info!(from, to = state.name(), "step");
        if let ScenarioState::Done(outcome) = state {
            return ScenarioReport {
                date: scenario.date,
                task: scenario.task.name.clone(),
                started_at,
                finished_at: Utc::now(),
                outcome,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::error::{HarnessError, HarnessResult};
    use crate::frame::Value;
    use crate::task::{TaskLauncher, TaskOutcome};
    use async_trait::async_trait;
    use duckdb::Connection;
    use std::{
        fs,
        sync::{
            atomic::{AtomicUsize, Ordering as AtomicOrdering},
            Arc,
        },
        time::Duration,
    };
    use tempfile::{tempdir, TempDir};
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    const SEED: &str = include_str!("../../tests/fixtures/catalog/seed.sql");

    fn init_tracing() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,catalog_acceptance=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn fixture_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/catalog")
    }

    /// Stands in for the warehouse load: writes SQL into the database file
    /// through its own connection and closes it before returning.
    struct SeedingLauncher {
        database: PathBuf,
        sql: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TaskLauncher for SeedingLauncher {
        async fn launch(&self, request: &TaskRequest) -> HarnessResult<TaskOutcome> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            let failed = |e: duckdb::Error| HarnessError::TaskExecution {
                task: request.name.clone(),
                exit_info: e.to_string(),
            };
            let conn = Connection::open(&self.database).map_err(failed)?;
            conn.execute_batch(&self.sql).map_err(failed)?;
            Ok(TaskOutcome {
                task: request.name.clone(),
                elapsed: Duration::ZERO,
            })
        }
    }

    struct Setup {
        harness: Harness,
        scenario: Scenario,
        calls: Arc<AtomicUsize>,
        database: PathBuf,
        _root: TempDir,
    }

    fn setup(data_dir: PathBuf, sql: String) -> Setup {
        init_tracing();
        let root = tempdir().unwrap();
        let database = root.path().join("catalog.duckdb");
        let calls = Arc::new(AtomicUsize::new(0));
        let launcher = SeedingLauncher {
            database: database.clone(),
            sql,
            calls: Arc::clone(&calls),
        };
        let harness = Harness {
            loader: FixtureLoader::new(root.path().join("warehouse"), catalog::RAW_NAMESPACE),
            invoker: TaskInvoker::new(Box::new(launcher)),
            warehouse: Some(Warehouse::new(&database, "acceptance").unwrap()),
        };
        let documents = catalog::INPUT_DOCUMENTS
            .iter()
            .map(|name| RawDocument::new(*name, data_dir.join("input").join(name)))
            .collect();
        let scenario = Scenario {
            date: catalog::default_date(),
            task: TaskRequest::new(catalog::TASK_NAME, catalog::default_date()),
            documents,
            data_dir,
            tables: catalog::tables(),
        };
        Setup {
            harness,
            scenario,
            calls,
            database,
            _root: root,
        }
    }

    /// Copy the catalog fixtures so a test can edit them.
    fn fixture_copy() -> TempDir {
        let dir = tempdir().unwrap();
        for sub in ["input", "output"] {
            let dest = dir.path().join(sub);
            fs::create_dir_all(&dest).unwrap();
            for entry in fs::read_dir(fixture_dir().join(sub)).unwrap() {
                let entry = entry.unwrap();
                fs::copy(entry.path(), dest.join(entry.file_name())).unwrap();
            }
        }
        dir
    }

    #[tokio::test]
    async fn consistent_fixtures_pass_every_table() {
        let s = setup(fixture_dir(), SEED.to_string());
        let report = run(&s.scenario, &s.harness).await;

        assert!(report.outcome.is_success(), "{}", report.summary());
        assert_eq!(report.outcome.tables().len(), 4);
        for t in report.outcome.tables() {
            assert!(t.result.is_pass(), "{}: {:?}", t.table, t.result);
        }
        let staged = s
            .harness
            .loader
            .partition_dir(s.scenario.date)
            .join("courses.json");
        assert!(staged.ends_with("discovery_api_raw/dt=2016-09-08/courses.json"));
        assert!(staged.exists());
    }

    #[tokio::test]
    async fn altered_fixture_value_is_reported() {
        let data = fixture_copy();
        let path = data
            .path()
            .join("output/acceptance_expected_d_program_course.csv");
        let text = fs::read_to_string(&path).unwrap();
        fs::write(
            &path,
            text.replacen("Demo XSeries Program", "Altered Program Title", 1),
        )
        .unwrap();

        let s = setup(data.path().to_path_buf(), SEED.to_string());
        let report = run(&s.scenario, &s.harness).await;

        assert!(!report.outcome.is_success());
        match report.outcome.table("d_program_course") {
            Some(TableResult::Fail(Mismatch::Value {
                row,
                column,
                actual,
                expected,
            })) => {
                assert_eq!(*row, 0);
                assert_eq!(column, "program_title");
                assert_eq!(actual, &Value::from("Demo XSeries Program"));
                assert_eq!(expected, &Value::from("Altered Program Title"));
            }
            other => panic!("unexpected {:?}", other),
        }
        for name in ["d_course_seat", "d_course", "d_course_subjects"] {
            assert!(report.outcome.table(name).unwrap().is_pass(), "{name}");
        }
    }

    #[tokio::test]
    async fn every_broken_table_is_reported() {
        let sql = format!(
            "{}
             INSERT INTO acceptance.d_course_seat VALUES
                 ('course-v1:edX+Zeta+2016', 'audit', 0.00, 'USD', NULL, NULL, NULL);
             DROP TABLE acceptance.d_course;",
            SEED
        );
        let s = setup(fixture_dir(), sql);
        let report = run(&s.scenario, &s.harness).await;

        assert!(matches!(report.outcome, ScenarioOutcome::Fail { .. }));
        assert!(matches!(
            report.outcome.table("d_course_seat"),
            Some(TableResult::Fail(Mismatch::RowCount {
                actual: 5,
                expected: 4
            }))
        ));
        assert!(matches!(
            report.outcome.table("d_course"),
            Some(TableResult::Error(HarnessError::Query { .. }))
        ));
        assert!(report.outcome.table("d_program_course").unwrap().is_pass());
        assert!(report.outcome.table("d_course_subjects").unwrap().is_pass());
    }

    #[tokio::test]
    async fn task_failure_aborts_before_validation() {
        let s = setup(fixture_dir(), "THIS IS NOT SQL;".to_string());
        let report = run(&s.scenario, &s.harness).await;

        match &report.outcome {
            ScenarioOutcome::Aborted { stage, error } => {
                assert_eq!(*stage, Stage::Invocation);
                assert!(matches!(error, HarnessError::TaskExecution { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(report.outcome.tables().is_empty());
        assert_eq!(s.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_input_aborts_before_launch() {
        let mut s = setup(fixture_dir(), SEED.to_string());
        s.scenario
            .documents
            .push(RawDocument::new("orgs.json", fixture_dir().join("input/orgs.json")));
        let report = run(&s.scenario, &s.harness).await;

        assert!(matches!(
            report.outcome,
            ScenarioOutcome::Aborted {
                stage: Stage::Staging,
                error: HarnessError::Staging { .. }
            }
        ));
        assert_eq!(s.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_warehouse_skips() {
        let mut s = setup(fixture_dir(), SEED.to_string());
        s.harness.warehouse = None;
        let report = run(&s.scenario, &s.harness).await;
        assert!(matches!(report.outcome, ScenarioOutcome::Skipped { .. }));
        assert!(report.outcome.is_success());
        assert_eq!(s.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn states_advance_in_order() {
        let s = setup(fixture_dir(), SEED.to_string());
        let mut state = ScenarioState::Init;
        let mut seen = vec![state.name()];
        while !state.is_done() {
            state = state.advance(&s.scenario, &s.harness).await;
            seen.push(state.name());
        }
        assert_eq!(
            seen,
            vec![
                "init",
                "staged",
                "invoked",
                "validating",
                "validating",
                "validating",
                "validating",
                "validating",
                "done",
            ]
        );
    }

    #[tokio::test]
    async fn validation_is_repeatable() {
        let s = setup(fixture_dir(), SEED.to_string());
        let first = run(&s.scenario, &s.harness).await;
        let wh = s.harness.warehouse.as_ref().unwrap();
        let a = wh.fetch(&catalog::course()).unwrap();
        let b = wh.fetch(&catalog::course()).unwrap();
        assert_eq!(a, b);
        assert!(first.outcome.is_success());
    }

    #[tokio::test]
    async fn unreachable_warehouse_fails_each_table() {
        let mut s = setup(fixture_dir(), SEED.to_string());
        let missing = s.database.with_file_name("elsewhere.duckdb");
        s.harness.warehouse = Some(Warehouse::new(&missing, "acceptance").unwrap());
        let report = run(&s.scenario, &s.harness).await;

        assert!(matches!(report.outcome, ScenarioOutcome::Fail { .. }));
        assert_eq!(report.outcome.tables().len(), 4);
        for t in report.outcome.tables() {
            assert!(
                matches!(&t.result, TableResult::Error(HarnessError::Query { table, .. }) if table == &t.table),
                "{}: {:?}",
                t.table,
                t.result
            );
        }
    }

    const SEED_DB_ENV: &str = "CATALOG_ACCEPTANCE_SEED_DB";

    /// Body of the child process launched by `external_task_loads_the_warehouse_file`.
    /// Does nothing in a normal test run.
    #[test]
    fn seed_warehouse_from_env() {
        if let Ok(path) = std::env::var(SEED_DB_ENV) {
            Connection::open(path).unwrap().execute_batch(SEED).unwrap();
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn external_task_loads_the_warehouse_file() {
        use crate::task::CommandLauncher;

        let mut s = setup(fixture_dir(), String::new());
        let exe = std::env::current_exe().unwrap();
        // sh swallows the task name and --date as positional parameters.
        let script = format!(
            "{}='{}' exec '{}' --exact scenario::tests::seed_warehouse_from_env --quiet",
            SEED_DB_ENV,
            s.database.display(),
            exe.display()
        );
        s.harness.invoker = TaskInvoker::new(Box::new(CommandLauncher::new(
            "sh",
            vec!["-c".into(), script, "sh".into()],
        )));
        let report = run(&s.scenario, &s.harness).await;

        assert!(report.outcome.is_success(), "{}", report.summary());
        assert_eq!(report.outcome.tables().len(), 4);
        assert_eq!(s.calls.load(AtomicOrdering::SeqCst), 0);
        assert!(s.database.exists());
    }
}
