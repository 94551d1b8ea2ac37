//! Benchmark configuration
//!
//! Values come from (lowest to highest precedence) built-in defaults, a
//! `.env` file, process environment variables and finally CLI flags.

use crate::batch::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use crate::coordinator::RunOptions;
use crate::error::{LoadError, Result};
use crate::loader::{validate_table_name, Dialect, InsertMode};
use crate::record::ParseMode;
use loadbench_common::results::RunLabels;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Default database URL for a local benchmark database.
pub const DEFAULT_DATABASE_URL: &str = "mysql://root:@localhost:3306/benchmark";

/// Default input file.
pub const DEFAULT_CSV_PATH: &str = "test-file.csv";

/// Default target table.
pub const DEFAULT_TABLE: &str = "products";

/// Default directory for result JSON files.
pub const DEFAULT_RESULTS_DIR: &str = "results";

/// Rows between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// Deadline for a single batch transaction, in seconds. Zero disables it.
pub const DEFAULT_COMMIT_TIMEOUT_SECS: u64 = 300;

pub const DEFAULT_MODE_LABEL: &str = "Boring";
pub const DEFAULT_VARIANT_LABEL: &str = "Plain";

/// Everything needed to run one benchmark
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub database_url: String,
    pub csv_path: PathBuf,
    pub table: String,
    pub batch_size: usize,
    pub results_dir: PathBuf,
    pub progress_interval: u64,
    pub commit_timeout_secs: u64,
    pub parse_mode: ParseMode,
    pub insert_mode: InsertMode,
    /// Empty the table before loading
    pub truncate: bool,
    /// Database label; derived from the URL scheme when unset
    pub db_label: Option<String>,
    pub mode_label: String,
    pub variant_label: String,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            table: DEFAULT_TABLE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            commit_timeout_secs: DEFAULT_COMMIT_TIMEOUT_SECS,
            parse_mode: ParseMode::default(),
            insert_mode: InsertMode::default(),
            truncate: true,
            db_label: None,
            mode_label: DEFAULT_MODE_LABEL.to_string(),
            variant_label: DEFAULT_VARIANT_LABEL.to_string(),
        }
    }
}

impl BenchConfig {
    /// Load configuration from `.env`, environment and defaults
    ///
    /// Environment variables:
    /// - `DATABASE_URL`
    /// - `LOADBENCH_CSV`, `LOADBENCH_TABLE`, `LOADBENCH_RESULTS_DIR`
    /// - `LOADBENCH_BATCH_SIZE`, `LOADBENCH_PROGRESS_INTERVAL`
    /// - `LOADBENCH_COMMIT_TIMEOUT` (seconds, 0 disables)
    /// - `LOADBENCH_PARSE_MODE` (permissive, strict)
    /// - `LOADBENCH_INSERT_MODE` (per-row, multi-row)
    /// - `LOADBENCH_DB_LABEL`, `LOADBENCH_MODE`, `LOADBENCH_VARIANT`
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Build from the process environment only
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            database_url: env_string("DATABASE_URL").unwrap_or(defaults.database_url),
            csv_path: env_string("LOADBENCH_CSV")
                .map(PathBuf::from)
                .unwrap_or(defaults.csv_path),
            table: env_string("LOADBENCH_TABLE").unwrap_or(defaults.table),
            batch_size: env_parse("LOADBENCH_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            results_dir: env_string("LOADBENCH_RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            progress_interval: env_parse("LOADBENCH_PROGRESS_INTERVAL")?
                .unwrap_or(defaults.progress_interval),
            commit_timeout_secs: env_parse("LOADBENCH_COMMIT_TIMEOUT")?
                .unwrap_or(defaults.commit_timeout_secs),
            parse_mode: env_parse("LOADBENCH_PARSE_MODE")?.unwrap_or(defaults.parse_mode),
            insert_mode: env_parse("LOADBENCH_INSERT_MODE")?.unwrap_or(defaults.insert_mode),
            truncate: defaults.truncate,
            db_label: env_string("LOADBENCH_DB_LABEL"),
            mode_label: env_string("LOADBENCH_MODE").unwrap_or(defaults.mode_label),
            variant_label: env_string("LOADBENCH_VARIANT").unwrap_or(defaults.variant_label),
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(LoadError::Config("Database URL cannot be empty".to_string()));
        }
        Dialect::from_url(&self.database_url)?;

        if self.csv_path.as_os_str().is_empty() {
            return Err(LoadError::Config("CSV path cannot be empty".to_string()));
        }

        if self.results_dir.as_os_str().is_empty() {
            return Err(LoadError::Config("Results directory cannot be empty".to_string()));
        }

        validate_table_name(&self.table)?;

        if self.batch_size == 0 {
            return Err(LoadError::Config("Batch size must be greater than 0".to_string()));
        }

        if self.batch_size > MAX_BATCH_SIZE {
            return Err(LoadError::Config(format!(
                "Batch size {} exceeds the maximum of {MAX_BATCH_SIZE}",
                self.batch_size
            )));
        }

        if self.progress_interval == 0 {
            return Err(LoadError::Config(
                "Progress interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn commit_timeout(&self) -> Option<Duration> {
        (self.commit_timeout_secs > 0).then(|| Duration::from_secs(self.commit_timeout_secs))
    }

    pub fn labels(&self) -> RunLabels {
        let db = match &self.db_label {
            Some(label) => label.clone(),
            None => Dialect::from_url(&self.database_url)
                .map(|d| d.label().to_string())
                .unwrap_or_else(|_| "Unknown".to_string()),
        };
        RunLabels::new(db, &self.mode_label, &self.variant_label)
    }
}

impl From<&BenchConfig> for RunOptions {
    fn from(config: &BenchConfig) -> Self {
        RunOptions {
            batch_size: config.batch_size,
            progress_interval: config.progress_interval,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| LoadError::Config(format!("{key}='{raw}': {e}")))
        })
        .transpose()
}
