//! hosthoover
//!
//! Backs up the running configuration of every reachable network device in a
//! subnet, then archives, commits and reports on the run.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr;
use hosthoover_core::{
    Orchestrator, OrchestratorArgs, PostProcessReport, ResultWriter, RunOutcome, RunReport,
    StageStatus, enumerate,
};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod exit;
mod factory;
mod signal;

use config::{FileConfig, Overrides, Settings};

#[derive(Parser, Debug)]
#[command(name = "hosthoover", version)]
#[command(about = "Concurrent configuration backup for network devices", long_about = None)]
struct Cli {
    /// Configuration file (YAML or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error handler: {e}");
    }
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(report) => {
            eprintln!("Error: {report:?}");
            ExitCode::from(exit::ABORTED)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let (file, config_path) = match &cli.config {
        Some(path) => (FileConfig::load(path)?, Some(path.clone())),
        None => FileConfig::load_default()?,
    };
    let settings = Settings::resolve(file, cli.overrides)?;
    init_tracing(&settings.log_level, cli.log_json)?;

    match &config_path {
        Some(path) => info!(config = %path.display(), "configuration loaded"),
        None => info!("no configuration file found, using defaults and flags"),
    }

    let addrs = enumerate(&settings.subnet)?;
    let targets = factory::target_template(&settings)?.expand(&addrs);
    info!(
        subnet = %settings.subnet,
        hosts = targets.len(),
        workers = settings.max_workers,
        device = %settings.device_type,
        "targets enumerated"
    );

    let post = factory::post_processor(&settings).await?;
    let orchestrator = Orchestrator::new(OrchestratorArgs {
        connector: factory::connector(&settings),
        prober: factory::prober(&settings),
        writer: ResultWriter::new(&settings.output_dir),
        settings: settings.run.clone(),
    });

    signal::cancel_on_signal(orchestrator.shutdown_token());

    let outcome = orchestrator
        .run_and_process(targets, settings.max_workers, &post)
        .await?;

    print_summary(&outcome);

    Ok(ExitCode::from(conclude(
        &outcome,
        settings.report_json.as_deref(),
    )))
}

/// Export the report if requested and pick the exit status
///
/// The status reflects the run alone; a failed export is logged.
fn conclude(outcome: &RunOutcome, report_json: Option<&Path>) -> u8 {
    if let Some(path) = report_json {
        match write_report_json(path, outcome) {
            Ok(()) => info!(path = %path.display(), "run report written"),
            Err(e) => error!(
                path = %path.display(),
                error = %format!("{e:#}"),
                "run report could not be written"
            ),
        }
    }
    exit::code_for(&outcome.report)
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .wrap_err_with(|| format!("invalid log level {level:?}"))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn stage(status: &StageStatus) -> String {
    match status {
        StageStatus::Completed(detail) => format!("completed ({detail})"),
        StageStatus::Skipped(reason) => format!("skipped ({reason})"),
        StageStatus::Failed(error) => format!("FAILED ({error})"),
        StageStatus::Disabled => "disabled".to_string(),
    }
}

fn print_summary(outcome: &RunOutcome) {
    let report = &outcome.report;
    let counts = report.counts();

    println!("\nBackup Summary ({})", report.run_id());
    println!("  Targets:      {}", counts.total);
    println!("  Attempted:    {}", counts.attempted);
    println!("  Succeeded:    {}", counts.succeeded);
    println!("  Failed:       {}", counts.failed);
    println!("  Unreachable:  {}", counts.unreachable);
    if counts.not_dispatched > 0 {
        println!("  Not started:  {}", counts.not_dispatched);
    }

    if report.has_failures() {
        println!("\nFailures:");
        for entry in report.failures() {
            println!(
                "  {:<40} {:<16} {}",
                entry.target.addr(),
                entry.outcome.kind(),
                entry.outcome.reason().unwrap_or_default()
            );
        }
    }

    let post = &outcome.post;
    println!();
    match &post.archive_path {
        Some(path) => println!("Archive: {}", path.display()),
        None => println!("Archive: {}", stage(&post.archive)),
    }
    println!("Commit:  {}", stage(&post.commit));
    println!("Notify:  {}", stage(&post.notify));
    if report.is_partial() {
        println!("\nRun interrupted; report is partial.");
    }
}

#[derive(Serialize)]
struct ReportExport<'a> {
    report: &'a RunReport,
    post: &'a PostProcessReport,
}

fn write_report_json(path: &Path, outcome: &RunOutcome) -> Result<()> {
    let export = ReportExport {
        report: &outcome.report,
        post: &outcome.post,
    };
    let json = serde_json::to_string_pretty(&export)?;
    std::fs::write(path, json).wrap_err_with(|| format!("cannot write {}", path.display()))?;
    Ok(())
}
