//! fnflow CLI - translate a run's function graph into scheduler jobs.

use anyhow::{Context, Result};
use clap::Parser;
use fnflow_core::RunPlan;
use fnflow_execution::{DriverConfig, DriverMode, ExecutionDriver, GraphSpec, SubmitOptions};
use fnflow_resources::ResourceConfigStore;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fnflow")]
#[command(about = "Translate a pipeline function graph into scheduler submissions", long_about = None)]
struct Cli {
    /// Function graph JSON: {"nodes": [...], "edges": [["from", "to"], ...]}
    #[arg(long)]
    graph: PathBuf,

    /// Run plan JSON: {"id_run": N, "functions": {"name": [definitions]}}
    #[arg(long)]
    definitions: PathBuf,

    /// Resource policy JSON
    #[arg(long)]
    resources: PathBuf,

    /// Run-scoped directory for job logs
    #[arg(long)]
    log_dir: PathBuf,

    /// Submission file records are appended to
    #[arg(long, default_value = "jobs.json")]
    output: PathBuf,

    /// Hand the submission file to the scheduler once written
    #[arg(long)]
    submit: bool,

    /// Submit program
    #[arg(long, default_value = "wr")]
    program: String,

    /// Working directory of remote jobs
    #[arg(long, default_value = ".")]
    cwd: PathBuf,

    /// Disk requirement in GB
    #[arg(long, default_value = "0")]
    disk: u32,

    /// Resource override level
    #[arg(long = "override", default_value = "2")]
    override_level: u8,

    /// Retries granted to each job by the scheduler
    #[arg(long, default_value = "1")]
    retries: u32,

    /// Environment variables to forward, comma separated
    #[arg(long, value_delimiter = ',')]
    env: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let graph = read_json::<GraphSpec>(&cli.graph)?
        .build()
        .with_context(|| format!("Invalid function graph {}", cli.graph.display()))?;
    let plan: RunPlan = read_json(&cli.definitions)?;
    let resources = ResourceConfigStore::from_file(&cli.resources)?;
    info!(
        "Archival functions limited by {}",
        resources.archive_limit().tag()
    );

    let mut submit = SubmitOptions::default()
        .with_program(cli.program)
        .with_cwd(cli.cwd)
        .with_disk(cli.disk)
        .with_override(cli.override_level)
        .with_retries(cli.retries);
    if let Some(env) = cli.env {
        submit = submit.with_env_whitelist(env);
    }

    let config = DriverConfig::default()
        .with_mode(if cli.submit {
            DriverMode::Submit
        } else {
            DriverMode::WriteOnly
        })
        .with_submission_file(cli.output)
        .with_log_dir(cli.log_dir)
        .with_submit_options(submit);

    let driver = ExecutionDriver::new(config, resources);
    info!(
        "Run {}: {} function(s) in graph, mode {:?}",
        plan.id_run,
        graph.len(),
        driver.config().mode
    );

    let summary = driver.run(&graph, &plan).await?;

    println!("Run {}", summary.id_run);
    for (function, count) in &summary.jobs_per_function {
        println!("  {}: {}", function, count);
    }
    for function in &summary.skipped {
        println!("  {}: excluded", function);
    }
    println!(
        "{} job(s) {} {}",
        summary.total_jobs(),
        if summary.submitted { "submitted from" } else { "written to" },
        summary.submission_file.display()
    );

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Cannot parse {}", path.display()))
}
