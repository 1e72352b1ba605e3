use anyhow::{bail, Context, Result};
use catalog_acceptance::{config::WarehouseConfig, scenario, HarnessConfig};
use chrono::NaiveDate;
use clap::Parser;
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Stage catalog fixtures, run the warehouse load, and check its output tables.
#[derive(Parser, Debug)]
struct Args {
    /// YAML harness config; defaults describe the course-catalog scenario
    #[arg(long)]
    config: Option<PathBuf>,

    /// Partition date, YYYY-MM-DD
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Directory holding input/ and output/ fixtures
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Root the raw documents are staged under
    #[arg(long)]
    warehouse_root: Option<PathBuf>,

    /// DuckDB database holding the loaded tables
    #[arg(long)]
    database: Option<PathBuf>,

    /// Schema of the loaded tables
    #[arg(long)]
    schema: Option<String>,

    /// Write a JSON run report here
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<HarnessConfig> {
        let mut cfg = match &self.config {
            Some(path) => HarnessConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => HarnessConfig::default(),
        };
        if let Some(date) = self.date {
            cfg.date = date;
        }
        if let Some(dir) = self.data_dir {
            cfg.data_dir = dir;
        }
        if let Some(root) = self.warehouse_root {
            cfg.warehouse_root = root;
        }
        if let Some(database) = self.database {
            let schema = cfg
                .warehouse
                .take()
                .map(|w| w.schema)
                .unwrap_or_else(|| "acceptance".to_string());
            cfg.warehouse = Some(WarehouseConfig { database, schema });
        }
        if let Some(schema) = self.schema {
            match cfg.warehouse.as_mut() {
                Some(w) => w.schema = schema,
                None => bail!(
                    "--schema {} given without --database or a configured warehouse",
                    schema
                ),
            }
        }
        if self.report_dir.is_some() {
            cfg.report_dir = self.report_dir;
        }
        cfg.validate().context("validating config")?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,catalog_acceptance=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) resolve config ───────────────────────────────────────────
    let cfg = Args::parse().into_config()?;
    info!(
        date = %cfg.date,
        data_dir = %cfg.data_dir.display(),
        warehouse_root = %cfg.warehouse_root.display(),
        "startup"
    );

    // ─── 3) run the scenario ─────────────────────────────────────────
    let scenario = cfg.scenario().context("building scenario")?;
    let harness = cfg.harness().context("connecting to warehouse")?;
    let report = scenario::run(&scenario, &harness).await;

    // ─── 4) report ───────────────────────────────────────────────────
    println!("{}", report.summary());
    if let Some(dir) = &cfg.report_dir {
        match report.write_json(dir) {
            Ok(path) => info!(path = %path.display(), "wrote report"),
            Err(e) => error!("writing report failed: {:#}", e),
        }
    }

    Ok(if report.outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
