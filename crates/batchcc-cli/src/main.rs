//! batchcc - compile every C source in a directory and sort the results
//!
//! Each `.c` file is compiled on its own with flags inferred from its
//! `#include` lines. Built binaries are moved to the success directory,
//! sources that fail are copied to the failed directory, and every attempt is
//! recorded in a CSV report.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use batchcc_core::{
    init_tracing, BatchConfig, BatchError, FileReport, Orchestrator, PkgConfig, RecordStatus,
    RuleTable, RunOutcome, RunReport, DEFAULT_TIMEOUT_SECS,
};

#[derive(Parser)]
#[command(name = "batchcc")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile all .c files and log results.", long_about = None)]
struct Cli {
    /// Directory containing .c files to compile
    #[arg(short, long)]
    input: PathBuf,

    /// Directory to copy failed files
    #[arg(short, long, default_value = "./failed")]
    output: PathBuf,

    /// Directory to store successful .out files
    #[arg(short, long, default_value = "./success")]
    success: PathBuf,

    /// CSV report path
    #[arg(long, default_value = "compile_results.csv")]
    report: PathBuf,

    /// Also write a JSON run summary to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Compiler executable
    #[arg(long, env = "BATCHCC_COMPILER", default_value = "gcc")]
    compiler: String,

    /// Per-file compile budget in seconds
    #[arg(long, env = "BATCHCC_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Maximum concurrent compiles (default: available CPUs)
    #[arg(short, long, env = "BATCHCC_JOBS")]
    jobs: Option<usize>,

    /// TOML rule table replacing the built-in header rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Flag-query tool used for package rules
    #[arg(long, default_value = "pkg-config")]
    pkg_config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn to_config(&self) -> BatchConfig {
        let mut config = BatchConfig::new(self.input.clone());
        config.failed_dir = self.output.clone();
        config.success_dir = self.success.clone();
        config.report_path = self.report.clone();
        config.summary_json = self.summary_json.clone();
        config.compiler = self.compiler.clone();
        config.timeout_secs = self.timeout;
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    init_tracing(cli.json, level);

    let rules = match &cli.rules {
        Some(path) => RuleTable::load(path)?,
        None => RuleTable::builtin(),
    };

    cmd_compile(cli.to_config(), rules, &cli.pkg_config).await
}

/// Compile every source in the input directory and print a summary
async fn cmd_compile(config: BatchConfig, rules: RuleTable, pkg_config: &str) -> Result<()> {
    let input_dir = config.input_dir.clone();
    let failed_dir = config.failed_dir.clone();
    let success_dir = config.success_dir.clone();
    let extension = config.source_extension.clone();

    // Ctrl-C stops new compiles; in-flight files still finish and are reported.
    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; finishing in-flight compiles");
            let _ = cancel_tx.send(true);
        }
    });

    let orchestrator = Orchestrator::new(config, rules, Arc::new(PkgConfig::with_program(pkg_config)))?
        .with_cancellation(cancel_rx);

    let count = batchcc_core::discover_sources(&input_dir, &extension)
        .map(|files| files.len())
        .unwrap_or(0);
    if count > 0 {
        println!("📁 Compiling {} .{} files in {}...\n", count, extension, input_dir.display());
    }

    let outcome = match orchestrator.run().await {
        Ok(outcome) => outcome,
        // Like an empty input: report it and stop without writing anything.
        Err(BatchError::InputDirMissing { path }) => {
            println!("❌ Input directory '{}' does not exist.", path.display());
            return Ok(());
        }
        Err(e) => return Err(e).context("batch compile failed"),
    };

    let report = match outcome {
        RunOutcome::NoSources => {
            println!("⚠ No .{} files found.", extension);
            return Ok(());
        }
        RunOutcome::Completed(report) => report,
    };

    for file in &report.files {
        print_file(file);
    }
    print_summary(&report, &failed_dir, &success_dir);

    Ok(())
}

fn print_file(file: &FileReport) {
    let record = &file.record;
    let symbol = if record.status.is_success() { "✅" } else { "❌" };
    let label = match record.status {
        RecordStatus::Success => "Success",
        RecordStatus::Fail => "Fail",
        RecordStatus::Timeout => "Fail (timeout)",
        RecordStatus::ArtifactError => "Fail (could not file result)",
    };
    println!("{} {} - {}", symbol, record.file, label);

    for failure in &file.resolution_failures {
        println!("    {}", failure.error);
    }
    for line in record.message.lines() {
        println!("    {}", line);
    }
}

fn print_summary(report: &RunReport, failed_dir: &Path, success_dir: &Path) {
    let summary = &report.summary;

    println!();
    println!("📄 Results saved to {}", report.report_path.display());
    println!("📂 Failed files copied to: {}/", failed_dir.display());
    println!("📦 Successful output files moved to: {}/", success_dir.display());
    if summary.skipped > 0 {
        println!("⏹ Interrupted: {} files not attempted.", summary.skipped);
    }
    println!();
    println!(
        "🧾 Summary: {} files compiled — {} succeeded, {} failed.",
        summary.total, summary.succeeded, summary.failed
    );
    if summary.timed_out > 0 || summary.artifact_errors > 0 {
        println!(
            "   ({} timed out, {} could not be filed)",
            summary.timed_out, summary.artifact_errors
        );
    }
}
