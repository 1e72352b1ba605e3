use chrono::NaiveDate;
use glob::glob;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::error::{HarnessError, HarnessResult};

/// A raw input file and the name it is staged under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub logical_name: String,
    pub source: PathBuf,
}

impl RawDocument {
    pub fn new(logical_name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            logical_name: logical_name.into(),
            source: source.into(),
        }
    }
}

/// List the `*.json` documents directly under `input_dir`, sorted by name.
pub fn discover(input_dir: &Path) -> HarnessResult<Vec<RawDocument>> {
    let pattern = format!("{}/*.json", input_dir.display());
    let entries = glob(&pattern).map_err(|e| HarnessError::Config(e.to_string()))?;
    let mut docs: Vec<RawDocument> = entries
        .filter_map(Result::ok)
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().to_string();
            Some(RawDocument::new(name, path))
        })
        .collect();
    docs.sort_by(|a, b| a.logical_name.cmp(&b.logical_name));
    Ok(docs)
}

/// Copies raw documents into the warehouse storage layout.
pub struct FixtureLoader {
    warehouse_root: PathBuf,
    raw_namespace: String,
}

impl FixtureLoader {
    pub fn new(warehouse_root: impl Into<PathBuf>, raw_namespace: impl Into<String>) -> Self {
        Self {
            warehouse_root: warehouse_root.into(),
            raw_namespace: raw_namespace.into(),
        }
    }

    /// `<warehouse_root>/<raw_namespace>/dt=<YYYY-MM-DD>`
    pub fn partition_dir(&self, date: NaiveDate) -> PathBuf {
        self.warehouse_root
            .join(&self.raw_namespace)
            .join(format!("dt={}", date.format("%Y-%m-%d")))
    }

    /// Stage every document under `date`, overwriting earlier copies.
    /// Returns the destination paths in input order.
    #[instrument(level = "info", skip(self, documents), fields(count = documents.len()))]
    pub async fn stage(
        &self,
        date: NaiveDate,
        documents: &[RawDocument],
    ) -> HarnessResult<Vec<PathBuf>> {
        let dir = self.partition_dir(date);
        let mut staged = Vec::with_capacity(documents.len());

        for doc in documents {
            let fail = |message: String| HarnessError::Staging {
                logical_name: doc.logical_name.clone(),
                source_path: doc.source.clone(),
                message,
            };

            let name = Path::new(&doc.logical_name);
            if doc.logical_name.is_empty() || name.file_name() != Some(name.as_os_str()) {
                return Err(fail("logical name must be a plain file name".into()));
            }
            if !fs::try_exists(&doc.source).await.unwrap_or(false) {
                return Err(fail("source file is missing".into()));
            }

            fs::create_dir_all(&dir)
                .await
                .map_err(|e| fail(format!("creating {}: {}", dir.display(), e)))?;
            let dest = dir.join(&doc.logical_name);
            let bytes = fs::copy(&doc.source, &dest)
                .await
                .map_err(|e| fail(format!("writing {}: {}", dest.display(), e)))?;

            info!(name = %doc.logical_name, dest = %dest.display(), bytes, "staged");
            staged.push(dest);
        }
        Ok(staged)
    }
}
