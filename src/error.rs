use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the harness components themselves.
///
/// `Staging` and `TaskExecution` abort a scenario; `Query` and `Fixture` are
/// scoped to the table being validated.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("staging {logical_name} from {}: {message}", .source_path.display())]
    Staging {
        logical_name: String,
        source_path: PathBuf,
        message: String,
    },

    #[error("task {task} failed: {exit_info}")]
    TaskExecution { task: String, exit_info: String },

    #[error("query on {table} failed: {message}")]
    Query { table: String, message: String },

    #[error("fixture {}: {message}", .path.display())]
    Fixture { path: PathBuf, message: String },

    #[error("config: {0}")]
    Config(String),
}

impl HarnessError {
    pub fn query(table: impl Into<String>, err: impl std::fmt::Display) -> Self {
        HarnessError::Query {
            table: table.into(),
            message: err.to_string(),
        }
    }

    pub fn fixture(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        HarnessError::Fixture {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
