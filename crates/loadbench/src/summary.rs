//! Final measurements of one run

use crate::sampler::SampleSeries;
use loadbench_common::results::{BenchmarkResult, RunLabels};
use std::time::Duration;

/// Aggregated measurements, built once when a run finishes
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total_rows: u64,
    pub elapsed: Duration,
    pub rows_per_sec: f64,
    /// Max over the raw memory samples
    pub peak_memory_mb: f64,
    /// Max over the raw CPU samples
    pub peak_cpu_percent: f64,
    pub series: SampleSeries,
}

impl RunSummary {
    pub fn new(
        total_rows: u64,
        elapsed: Duration,
        peak_memory_mb: f64,
        peak_cpu_percent: f64,
        series: SampleSeries,
    ) -> Self {
        Self {
            total_rows,
            elapsed,
            rows_per_sec: rows_per_sec(total_rows, elapsed.as_secs_f64()),
            peak_memory_mb,
            peak_cpu_percent,
            series,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Result record for the comparison tooling
    pub fn to_result(&self, labels: &RunLabels) -> BenchmarkResult {
        BenchmarkResult {
            db: labels.db.clone(),
            mode: labels.mode.clone(),
            variant: labels.variant.clone(),
            language: labels.language.clone(),
            total_rows: self.total_rows,
            total_time_sec: self.elapsed_secs(),
            rows_per_sec: self.rows_per_sec,
            peak_memory_mb: self.peak_memory_mb,
            peak_cpu_percent: self.peak_cpu_percent,
            memory_usage: self.series.memory_samples.clone(),
            memory_spikes: self.series.memory_spikes.clone(),
            cpu_usage: self.series.cpu_samples.clone(),
            cpu_spikes: self.series.cpu_spikes.clone(),
        }
    }
}

/// Throughput in rows per second; 0.0 when no time has elapsed
pub fn rows_per_sec(rows: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        rows as f64 / elapsed_secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_derivation() {
        assert_eq!(rows_per_sec(500_000, 50.0), 10_000.0);
        assert_eq!(rows_per_sec(0, 3.0), 0.0);
        assert_eq!(rows_per_sec(1000, 0.0), 0.0);
    }

    #[test]
    fn test_summary_to_result() {
        let series = SampleSeries {
            memory_samples: vec![20.0, 30.0],
            memory_spikes: vec![20.0, 30.0],
            cpu_samples: vec![75.0, 50.0],
            cpu_spikes: vec![75.0, 75.0],
        };
        let summary = RunSummary::new(500_000, Duration::from_secs(50), 30.0, 75.0, series);
        let result = summary.to_result(&RunLabels::new("PostgreSQL", "Boring", "Plain"));

        assert_eq!(result.rows_per_sec, 10_000.0);
        assert_eq!(result.total_time_sec, 50.0);
        assert_eq!(result.language, "Rust");
        assert_eq!(result.cpu_spikes, vec![75.0, 75.0]);
        assert_eq!(result.memory_usage.len(), result.cpu_usage.len());
    }
}
