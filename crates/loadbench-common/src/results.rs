//! Result records written after each benchmark run
//!
//! One JSON file per run, named after the run's labels. The field names of
//! [`BenchmarkResult`] are read by the cross-language comparison tooling and
//! must not change.

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Labels that identify a run across databases and implementations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLabels {
    /// Database engine label, e.g. "MySQL"
    pub db: String,
    /// Loading mode, e.g. "Boring"
    pub mode: String,
    /// Strategy variant, e.g. "Plain"
    pub variant: String,
    /// Implementation language
    pub language: String,
}

impl RunLabels {
    pub fn new(db: impl Into<String>, mode: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            mode: mode.into(),
            variant: variant.into(),
            language: "Rust".to_string(),
        }
    }

    /// File name for this run's result, e.g. `mysql_boring_plain_rust.json`
    pub fn file_name(&self) -> String {
        let stem = [&self.db, &self.mode, &self.variant, &self.language]
            .iter()
            .map(|part| part.trim().to_lowercase().replace(char::is_whitespace, "_"))
            .collect::<Vec<_>>()
            .join("_");
        format!("{stem}.json")
    }
}

/// Serialized summary of one benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub db: String,
    pub mode: String,
    pub variant: String,
    pub language: String,
    pub total_rows: u64,
    pub total_time_sec: f64,
    pub rows_per_sec: f64,
    pub peak_memory_mb: f64,
    pub peak_cpu_percent: f64,
    pub memory_usage: Vec<f64>,
    pub memory_spikes: Vec<f64>,
    pub cpu_usage: Vec<f64>,
    pub cpu_spikes: Vec<f64>,
}

impl BenchmarkResult {
    pub fn labels(&self) -> RunLabels {
        RunLabels {
            db: self.db.clone(),
            mode: self.mode.clone(),
            variant: self.variant.clone(),
            language: self.language.clone(),
        }
    }
}

/// Write `result` as pretty JSON into `dir`, creating the directory first
///
/// Returns the path of the written file.
pub fn write_result(dir: impl AsRef<Path>, result: &BenchmarkResult) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let path = dir.join(result.labels().file_name());
    let mut writer = std::io::BufWriter::new(std::fs::File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.flush()?;

    debug!(path = %path.display(), "Wrote benchmark result");
    Ok(path)
}

/// Read every `*.json` result in `dir`
///
/// Files that are not valid result records are skipped with a warning, so a
/// results directory shared with other tools can still be summarized.
pub fn load_results(dir: impl AsRef<Path>) -> Result<Vec<BenchmarkResult>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(CommonError::Config(format!(
            "results directory '{}' does not exist",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let parsed = std::fs::read_to_string(&path)
            .map_err(CommonError::from)
            .and_then(|text| serde_json::from_str(&text).map_err(CommonError::from));

        match parsed {
            Ok(result) => results.push(result),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable result"),
        }
    }

    Ok(results)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_result() -> BenchmarkResult {
        let labels = RunLabels::new("MySQL", "Boring", "Plain");
        BenchmarkResult {
            db: labels.db,
            mode: labels.mode,
            variant: labels.variant,
            language: labels.language,
            total_rows: 2500,
            total_time_sec: 0.5,
            rows_per_sec: 5000.0,
            peak_memory_mb: 12.5,
            peak_cpu_percent: 40.0,
            memory_usage: vec![10.0, 12.5, 11.0],
            memory_spikes: vec![10.0, 12.5, 12.5],
            cpu_usage: vec![40.0, 20.0, 30.0],
            cpu_spikes: vec![40.0, 40.0, 40.0],
        }
    }

    #[test]
    fn test_file_name_from_labels() {
        let mut labels = RunLabels::new("MySQL", "Boring", "A Plain");
        assert_eq!(labels.file_name(), "mysql_boring_a_plain_rust.json");

        labels.language = "Go".to_string();
        assert_eq!(labels.file_name(), "mysql_boring_a_plain_go.json");
    }

    #[test]
    fn test_field_names_are_stable() {
        let value = serde_json::to_value(sample_result()).unwrap();
        let object = value.as_object().unwrap();

        for key in [
            "db",
            "mode",
            "variant",
            "language",
            "total_rows",
            "total_time_sec",
            "rows_per_sec",
            "peak_memory_mb",
            "peak_cpu_percent",
            "memory_usage",
            "memory_spikes",
            "cpu_usage",
            "cpu_spikes",
        ] {
            assert!(object.contains_key(key), "missing field {key}");
        }
        assert_eq!(object.len(), 13);
    }

    #[test]
    fn test_write_then_load_skips_foreign_json() {
        let dir = tempfile::tempdir().unwrap();
        let results_dir = dir.path().join("results");

        let path = write_result(&results_dir, &sample_result()).unwrap();
        assert!(path.ends_with("mysql_boring_plain_rust.json"));

        std::fs::write(results_dir.join("notes.json"), r#"{"hello": 1}"#).unwrap();
        std::fs::write(results_dir.join("readme.txt"), "not json").unwrap();

        let loaded = load_results(&results_dir).unwrap();
        assert_eq!(loaded, vec![sample_result()]);
    }

    #[test]
    fn test_load_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_results(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, CommonError::Config(_)));
    }
}
