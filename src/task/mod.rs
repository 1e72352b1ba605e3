use async_trait::async_trait;
use chrono::NaiveDate;
use std::{
    collections::BTreeMap,
    process::Stdio,
    time::{Duration, Instant},
};
use tokio::process::Command;
use tracing::{error, info, instrument};

use crate::error::{HarnessError, HarnessResult};

/// Lines of stderr kept in a task failure.
const STDERR_TAIL_LINES: usize = 20;

/// A named workflow plus its `--key value` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    pub name: String,
    pub params: BTreeMap<String, String>,
}

impl TaskRequest {
    /// Every request carries the business date as `--date`.
    pub fn new(name: impl Into<String>, date: NaiveDate) -> Self {
        let mut params = BTreeMap::new();
        params.insert("date".to_string(), date.format("%Y-%m-%d").to_string());
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// `<name> --date <d> --<k> <v> ..`, with `date` first.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.name.clone()];
        if let Some(date) = self.params.get("date") {
            args.push("--date".to_string());
            args.push(date.clone());
        }
        for (k, v) in self.params.iter().filter(|(k, _)| k.as_str() != "date") {
            args.push(format!("--{}", k));
            args.push(v.clone());
        }
        args
    }
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: String,
    pub elapsed: Duration,
}

/// Something that can run a workflow to completion.
#[async_trait]
pub trait TaskLauncher: Send + Sync {
    async fn launch(&self, request: &TaskRequest) -> HarnessResult<TaskOutcome>;
}

/// Runs the workflow as `<program> <args..> <task> --date <d> ..` and waits for exit.
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl TaskLauncher for CommandLauncher {
    async fn launch(&self, request: &TaskRequest) -> HarnessResult<TaskOutcome> {
        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(&self.args)
            .args(request.to_args())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| HarnessError::TaskExecution {
                task: request.name.clone(),
                exit_info: format!("could not start {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            let tail = stderr_tail(&output.stderr);
            return Err(HarnessError::TaskExecution {
                task: request.name.clone(),
                exit_info: if tail.is_empty() {
                    output.status.to_string()
                } else {
                    format!("{}; stderr:\n{}", output.status, tail)
                },
            });
        }
        Ok(TaskOutcome {
            task: request.name.clone(),
            elapsed: start.elapsed(),
        })
    }
}

/// Single-shot invocation: no retry, no timeout.
pub struct TaskInvoker {
    launcher: Box<dyn TaskLauncher>,
}

impl TaskInvoker {
    pub fn new(launcher: Box<dyn TaskLauncher>) -> Self {
        Self { launcher }
    }

    #[instrument(level = "info", skip(self, request), fields(task = %request.name))]
    pub async fn run(&self, request: &TaskRequest) -> HarnessResult<TaskOutcome> {
        if !request.params.contains_key("date") {
            return Err(HarnessError::Config(format!(
                "task {} launched without a date",
                request.name
            )));
        }
        info!(args = ?request.to_args(), "launching");
        match self.launcher.launch(request).await {
            Ok(outcome) => {
                info!(elapsed = ?outcome.elapsed, "task finished");
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, "task failed");
                Err(e)
            }
        }
    }
}
