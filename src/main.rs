//! sqlharvest - batch SQL extraction to spreadsheets.

mod cli;
mod config;
mod db;
mod error;
mod export;
mod jobs;
mod logging;
mod tui;

use cli::Cli;
use config::Config;
use db::PostgresFactory;
use error::Result;
use export::{run_timestamp, write_summary, SpreadsheetWriter};
use jobs::{list_jobs, BatchEvent, BatchRunner, BatchSummary};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load .env from the working directory if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    if cli.is_interactive() {
        // File logging: stderr output would corrupt the terminal display.
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    let result = if cli.is_interactive() {
        run_interactive().await
    } else {
        run_batch().await
    };

    if let Err(e) = result {
        error!("{}: {e}", e.category());
        std::process::exit(1);
    }
}

async fn run_interactive() -> Result<()> {
    let config = Config::from_env()?;
    info!("Connection: {}", config.connection.display_string());
    tui::run(config).await
}

/// Runs every discovered query as one batch and prints the outcome.
///
/// Per-job failures are reported in the summary, not the exit code; only
/// configuration and report-writing problems are fatal.
async fn run_batch() -> Result<()> {
    let config = Config::from_env()?;
    info!("Connection: {}", config.connection.display_string());

    let jobs = list_jobs(&config.sql_dir);
    if jobs.is_empty() {
        println!("No SQL files found in {}", config.sql_dir.display());
        return Ok(());
    }

    let total = jobs.len();
    println!(
        "Running {total} quer{} with {} worker(s)",
        if total == 1 { "y" } else { "ies" },
        config.max_threads
    );

    let factory = Arc::new(PostgresFactory::new(config.connection.clone()));
    let writer = SpreadsheetWriter::new(&config.output_dir);
    let runner = BatchRunner::new(factory, writer).with_concurrency(config.max_threads);

    // Print a progress line as each job finishes.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<BatchEvent>();
    let printer = tokio::spawn(async move {
        let mut done = 0usize;
        while let Some(event) = rx.recv().await {
            if let BatchEvent::JobFinished { result } = event {
                done += 1;
                match result.failure_message() {
                    None => println!(
                        "[{done}/{total}] {} OK: {} rows in {:.2} min",
                        result.job_name,
                        result.row_count,
                        result.duration_minutes()
                    ),
                    Some(msg) => println!("[{done}/{total}] {} FAILED: {msg}", result.job_name),
                }
            }
        }
    });

    let summary = runner.run(jobs, Some(tx)).await;
    let _ = printer.await;

    let report = write_summary(&summary, &config.output_dir, &run_timestamp())?;

    print_summary(&summary);
    println!("Summary report: {}", report.display());

    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!(
        "{} job(s): {} succeeded, {} failed, total {:.2} min",
        summary.len(),
        summary.success_count(),
        summary.failure_count(),
        summary.total_duration.as_secs_f64() / 60.0
    );

    for result in &summary.results {
        match result.failure_message() {
            None => {
                let files = result
                    .output_paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("  {}: {} rows -> {}", result.job_name, result.row_count, files);
            }
            Some(msg) => println!("  {}: FAILED ({msg})", result.job_name),
        }
    }
}
