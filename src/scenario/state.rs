use tracing::{debug, warn};

use super::report::{ScenarioOutcome, Stage, TableReport, TableResult};
use super::{validate_table, Harness, Scenario};
use crate::error::HarnessError;

/// Scenario progress. Steps run strictly in order; a staging or invocation
/// failure jumps to `Done` without validating anything.
#[derive(Debug)]
pub enum ScenarioState {
    Init,
    Staged,
    Invoked,
    Validating {
        next: usize,
        tables: Vec<TableReport>,
    },
    Done(ScenarioOutcome),
}

impl ScenarioState {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioState::Init => "init",
            ScenarioState::Staged => "staged",
            ScenarioState::Invoked => "invoked",
            ScenarioState::Validating { .. } => "validating",
            ScenarioState::Done(_) => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ScenarioState::Done(_))
    }

    /// Perform one step. `Validating` checks one table per step.
    pub async fn advance(self, scenario: &Scenario, harness: &Harness) -> ScenarioState {
        match self {
            ScenarioState::Init => {
                if harness.warehouse.is_none() {
                    return ScenarioState::Done(ScenarioOutcome::Skipped {
                        reason: "no warehouse configured".into(),
                    });
                }
                match harness
                    .loader
                    .stage(scenario.date, &scenario.documents)
                    .await
                {
                    Ok(staged) => {
                        debug!(files = staged.len(), "inputs staged");
                        ScenarioState::Staged
                    }
                    Err(error) => ScenarioState::Done(ScenarioOutcome::Aborted {
                        stage: Stage::Staging,
                        error,
                    }),
                }
            }

            ScenarioState::Staged => match harness.invoker.run(&scenario.task).await {
                Ok(_) => ScenarioState::Invoked,
                Err(error) => ScenarioState::Done(ScenarioOutcome::Aborted {
                    stage: Stage::Invocation,
                    error,
                }),
            },

            ScenarioState::Invoked => ScenarioState::Validating {
                next: 0,
                tables: Vec::with_capacity(scenario.tables.len()),
            },

            ScenarioState::Validating { next, mut tables } => {
                let Some(descriptor) = scenario.tables.get(next) else {
                    return ScenarioState::Done(ScenarioOutcome::from_tables(tables));
                };
                let result = match &harness.warehouse {
                    Some(wh) => validate_table(wh, &scenario.data_dir, descriptor),
                    None => TableResult::Error(HarnessError::Config(
                        "no warehouse configured".into(),
                    )),
                };
                if !result.is_pass() {
                    warn!(table = %descriptor.name, result = ?result, "table failed validation");
                }
                tables.push(TableReport {
                    table: descriptor.name.clone(),
                    result,
                });
                ScenarioState::Validating {
                    next: next + 1,
                    tables,
                }
            }

            done @ ScenarioState::Done(_) => done,
        }
    }
}
