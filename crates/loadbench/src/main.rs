//! Loadbench - bulk-load benchmark tool

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use loadbench::config::BenchConfig;
use loadbench::coordinator::{RunCoordinator, RunOptions};
use loadbench::loader::{InsertMode, SqlLoader};
use loadbench::record::ParseMode;
use loadbench::sampler::{ProcessProbe, ResourceSampler};
use loadbench::source::RecordSource;
use loadbench::summary::RunSummary;
use loadbench_common::logging::{init_logging, LogConfig, LogLevel};
use loadbench_common::results::{load_results, write_result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "loadbench")]
#[command(author, version, about = "Benchmark batched bulk loading of a CSV file into a SQL table")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the CSV file and record throughput, memory and CPU
    Run(RunArgs),

    /// Summarize previously recorded results
    Report {
        /// Directory holding result JSON files
        #[arg(short, long, default_value = "results")]
        results_dir: PathBuf,
    },
}

/// Flags override `.env` and environment settings
#[derive(Args, Debug)]
struct RunArgs {
    /// Input CSV file (header row + 13 product fields)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Database URL (postgres://, mysql:// or sqlite:)
    ///
    /// Postgres column names are sent unquoted, so the table's columns must be
    /// unquoted (lowercase) identifiers such as `internalid`.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Target table
    #[arg(long)]
    table: Option<String>,

    /// Rows per transaction
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Directory for the result JSON file
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Database label in the result record (defaults from the URL)
    #[arg(long)]
    db_label: Option<String>,

    /// Mode label in the result record
    #[arg(long)]
    mode: Option<String>,

    /// Variant label in the result record
    #[arg(long)]
    variant: Option<String>,

    #[arg(long, value_enum)]
    insert_mode: Option<InsertMode>,

    /// How non-numeric Price/Stock values are handled
    #[arg(long, value_enum)]
    parse_mode: Option<ParseMode>,

    /// Per-batch commit deadline in seconds, 0 to disable
    #[arg(long)]
    commit_timeout_secs: Option<u64>,

    /// Rows between progress log lines
    #[arg(long)]
    progress_interval: Option<u64>,

    /// Keep existing rows instead of truncating the table first
    #[arg(long)]
    no_truncate: bool,
}

impl RunArgs {
    fn apply(self, config: &mut BenchConfig) {
        if let Some(csv) = self.csv {
            config.csv_path = csv;
        }
        if let Some(url) = self.database_url {
            config.database_url = url;
        }
        if let Some(table) = self.table {
            config.table = table;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(dir) = self.results_dir {
            config.results_dir = dir;
        }
        if let Some(label) = self.db_label {
            config.db_label = Some(label);
        }
        if let Some(mode) = self.mode {
            config.mode_label = mode;
        }
        if let Some(variant) = self.variant {
            config.variant_label = variant;
        }
        if let Some(mode) = self.insert_mode {
            config.insert_mode = mode;
        }
        if let Some(mode) = self.parse_mode {
            config.parse_mode = mode;
        }
        if let Some(secs) = self.commit_timeout_secs {
            config.commit_timeout_secs = secs;
        }
        if let Some(interval) = self.progress_interval {
            config.progress_interval = interval;
        }
        if self.no_truncate {
            config.truncate = false;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("loadbench")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    match cli.command {
        Command::Run(args) => run_benchmark(args).await,
        Command::Report { results_dir } => report(&results_dir),
    }
}

async fn run_benchmark(args: RunArgs) -> Result<()> {
    let mut config = BenchConfig::load().context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let labels = config.labels();
    info!(
        db = %labels.db,
        table = %config.table,
        csv = %config.csv_path.display(),
        batch_size = config.batch_size,
        insert_mode = %config.insert_mode,
        parse_mode = %config.parse_mode,
        "Starting benchmark"
    );

    let source = RecordSource::from_path(&config.csv_path)
        .with_context(|| format!("Failed to open {}", config.csv_path.display()))?;

    let mut loader = SqlLoader::connect(&config.database_url, &config.table)
        .await
        .context("Failed to connect to database")?
        .with_insert_mode(config.insert_mode)
        .with_parse_mode(config.parse_mode)
        .with_commit_timeout(config.commit_timeout());

    if config.truncate {
        loader
            .truncate()
            .await
            .with_context(|| format!("Failed to truncate table {}", config.table))?;
    }

    let sampler = ResourceSampler::new(ProcessProbe::new());
    let mut coordinator = RunCoordinator::new(loader, sampler, RunOptions::from(&config));
    let outcome = coordinator.run(source).await.context("Benchmark run aborted")?;

    let mut loader = coordinator.into_loader();
    if config.truncate {
        let stored = loader.row_count().await.context("Failed to count loaded rows")?;
        if stored != outcome.summary.total_rows {
            warn!(
                stored,
                inserted = outcome.summary.total_rows,
                "Table row count differs from rows inserted"
            );
        }
    }
    loader.close().await?;

    let result = outcome.summary.to_result(&labels);
    let path = write_result(&config.results_dir, &result).context("Failed to write result")?;

    print_summary(&outcome.summary, &path);
    Ok(())
}

fn print_summary(summary: &RunSummary, result_path: &Path) {
    println!();
    println!("{}", "DONE".green().bold());
    println!("Rows:      {}", summary.total_rows);
    println!("Time:      {:.2}s", summary.elapsed_secs());
    println!("Rows/sec:  {:.0}", summary.rows_per_sec);
    println!("Peak RAM:  {:.2} MB", summary.peak_memory_mb);
    println!("Peak CPU:  {:.2}%", summary.peak_cpu_percent);
    println!("Result:    {}", result_path.display());
}

fn report(results_dir: &Path) -> Result<()> {
    let mut results = load_results(results_dir)
        .with_context(|| format!("Failed to read results from {}", results_dir.display()))?;

    if results.is_empty() {
        println!("No results found in {}.", results_dir.display());
        println!("Run 'loadbench run' to record one.");
        return Ok(());
    }

    results.sort_by(|a, b| b.rows_per_sec.total_cmp(&a.rows_per_sec));

    println!("{}", "Benchmark Results:".cyan().bold());
    println!();
    println!(
        "{:<40} {:>12} {:>10} {:>12} {:>12} {:>10}",
        "Run", "Rows", "Time (s)", "Rows/sec", "Peak MB", "Peak CPU%"
    );

    for result in &results {
        let name = format!(
            "{}_{}_{}_{}",
            result.db, result.mode, result.variant, result.language
        );
        println!(
            "{} {:>12} {:>10.2} {:>12.0} {:>12.2} {:>10.2}",
            format!("{name:<40}").green(),
            result.total_rows,
            result.total_time_sec,
            result.rows_per_sec,
            result.peak_memory_mb,
            result.peak_cpu_percent
        );
    }

    println!();
    println!("{}", "Summary:".cyan().bold());
    println!("  Total runs: {}", results.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args_override_config() {
        let cli = Cli::try_parse_from([
            "loadbench",
            "run",
            "--csv",
            "data/products.csv",
            "--batch-size",
            "250",
            "--insert-mode",
            "multi-row",
            "--parse-mode",
            "strict",
            "--no-truncate",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };

        let mut config = BenchConfig::default();
        args.apply(&mut config);

        assert_eq!(config.csv_path, PathBuf::from("data/products.csv"));
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.insert_mode, InsertMode::MultiRow);
        assert_eq!(config.parse_mode, ParseMode::Strict);
        assert!(!config.truncate);
    }
}
