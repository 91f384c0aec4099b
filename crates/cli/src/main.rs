//! ACT Runner CLI - Main Entry Point
//!
//! Runs the ACT rules test suite against the configured detection engine,
//! writes `result.json` / `result.md` and prints a verdict summary.
//!
//! Exit status: 0 when every rule is automated or semi-automated, 1 when a
//! rule is incorrect or a test case errored, 2 when the run could not complete.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tracing::{error, info};

mod config;
mod output;

use act_runner::playwright::{Browser, PlaywrightLauncher};
use act_runner::report::{self, ReportSummary};
use act_runner::{GlobalBinding, TestRunner};
use config::{FileConfig, DEFAULT_CONFIG_FILE};

/// Global through which pages can write to the runner log
const HOST_LOG_GLOBAL: &str = "actRunnerLog";

/// ACT Runner - ACT rules conformance testing for accessibility engines
#[derive(Parser)]
#[command(name = "act-runner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file [default: act-runner.toml when present]
    #[arg(short, long, env = "ACT_RUNNER_CONFIG")]
    config: Option<PathBuf>,

    /// Fetch the test case catalog from this URL
    #[arg(long, conflicts_with = "catalog_file")]
    catalog_url: Option<String>,

    /// Read the test case catalog from a local file
    #[arg(long)]
    catalog_file: Option<PathBuf>,

    /// Only run these test case file names
    #[arg(long, num_args = 1..)]
    run_only: Vec<String>,

    /// Number of pages evaluated at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Headed, slowed-down browser with debug logging
    #[arg(long)]
    debug: bool,

    /// Directory for result.json and result.md
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Browser to run (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Summary format
    #[arg(long, default_value = "table")]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<FileConfig> {
        let mut config = match &self.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::load(Path::new(DEFAULT_CONFIG_FILE))?,
        };

        if let Some(url) = &self.catalog_url {
            config.catalog.url = Some(url.clone());
            config.catalog.path = None;
        }
        if let Some(path) = &self.catalog_file {
            config.catalog.path = Some(path.clone());
            config.catalog.url = None;
        }
        if !self.run_only.is_empty() {
            config.run_only = self.run_only.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if self.debug {
            config.debug = true;
        }
        if let Some(dir) = &self.output {
            config.output.dir = dir.clone();
        }
        if let Some(browser) = &self.browser {
            config.browser.kind = browser.parse::<Browser>()?;
        }
        Ok(config)
    }
}

fn host_functions() -> Vec<GlobalBinding> {
    vec![GlobalBinding::callable(HOST_LOG_GLOBAL, |args| {
        let line = args
            .iter()
            .map(|arg| match arg {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        info!("[page] {}", line);
        Ok(Value::Null)
    })]
}

async fn run(cli: &Cli, config: FileConfig) -> anyhow::Result<ReportSummary> {
    let runner_config = config.runner_config(host_functions())?;
    let catalog = config.catalog.source()?;
    let launcher = Arc::new(PlaywrightLauncher::new(config.playwright_config()));

    let report = TestRunner::new(runner_config, catalog, launcher).run().await?;

    report::write_json(&report, &config.output.json_path())?;
    report::write_markdown(&report, &config.output.markdown_path())?;

    let summary = ReportSummary::from_report(&report);
    output::print_report(&report, &summary, cli.format);
    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.load_config();

    // Initialize logging
    let debug = cli.verbose || config.as_ref().map(|c| c.debug).unwrap_or(cli.debug);
    let log_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let outcome = match config {
        Ok(config) => run(&cli, config).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(summary) if summary.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}
