//! Drives one benchmark run
//!
//! Rows flow source → accumulator → loader on a single thread of control.
//! After every committed batch, full or partial, the sampler takes exactly
//! one reading, so the recorded series line up batch for batch across runs.
//!
//! ```text
//! Idle → Streaming → Flushing (partial tail only) → Finalizing → Done
//! ```

use crate::batch::{BatchAccumulator, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use crate::config::DEFAULT_PROGRESS_INTERVAL;
use crate::error::{LoadError, Result};
use crate::loader::BatchLoader;
use crate::record::RawRecord;
use crate::sampler::{ResourceProbe, ResourceSampler};
use crate::summary::RunSummary;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Knobs of the run loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub batch_size: usize,
    /// Log a progress line every this many rows
    pub progress_interval: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Streaming,
    Flushing,
    Finalizing,
    Done,
}

/// What a completed run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub summary: RunSummary,
    /// Size of every committed batch, in order
    pub flushes: Vec<usize>,
}

pub struct RunCoordinator<L, P> {
    loader: L,
    sampler: ResourceSampler<P>,
    options: RunOptions,
    batch: BatchAccumulator,
    state: RunState,
    rows_inserted: u64,
    last_progress: u64,
    flushes: Vec<usize>,
}

impl<L: BatchLoader, P: ResourceProbe> RunCoordinator<L, P> {
    pub fn new(loader: L, sampler: ResourceSampler<P>, options: RunOptions) -> Self {
        Self {
            loader,
            sampler,
            // Sized in `run`, once the batch size has been checked
            batch: BatchAccumulator::new(0),
            options,
            state: RunState::Idle,
            rows_inserted: 0,
            last_progress: 0,
            flushes: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn rows_inserted(&self) -> u64 {
        self.rows_inserted
    }

    /// Hand the loader back, e.g. to verify the table or close the connection
    pub fn into_loader(self) -> L {
        self.loader
    }

    /// Load every row of `source` and summarize the run
    ///
    /// Any error (unreadable row, failed or timed-out commit, strict parse
    /// failure) stops the run immediately and no summary is produced.
    #[instrument(skip_all, fields(batch_size = self.options.batch_size))]
    pub async fn run<I>(&mut self, source: I) -> Result<RunOutcome>
    where
        I: IntoIterator<Item = Result<RawRecord>>,
    {
        if self.state != RunState::Idle {
            return Err(LoadError::Config(
                "a coordinator can only drive one run".to_string(),
            ));
        }
        if self.options.batch_size == 0 || self.options.batch_size > MAX_BATCH_SIZE {
            return Err(LoadError::Config(format!(
                "Batch size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.options.batch_size
            )));
        }
        self.batch = BatchAccumulator::new(self.options.batch_size);

        let started = Instant::now();
        self.transition(RunState::Streaming);

        for record in source {
            self.batch.add(record?);
            if self.batch.is_full() {
                self.flush().await?;
            }
        }

        if !self.batch.is_empty() {
            self.transition(RunState::Flushing);
            self.flush().await?;
        }

        self.transition(RunState::Finalizing);
        let summary = RunSummary::new(
            self.rows_inserted,
            started.elapsed(),
            self.sampler.peak_memory_mb(),
            self.sampler.peak_cpu_percent(),
            self.sampler.series(),
        );
        self.transition(RunState::Done);

        info!(
            rows = summary.total_rows,
            batches = self.flushes.len(),
            elapsed_secs = summary.elapsed_secs(),
            rows_per_sec = summary.rows_per_sec,
            "Run complete"
        );

        Ok(RunOutcome {
            summary,
            flushes: self.flushes.clone(),
        })
    }

    async fn flush(&mut self) -> Result<()> {
        let expected = self.batch.len() as u64;
        let first_row = self.rows_inserted as usize + 1;

        let committed = self.loader.load(self.batch.records(), first_row).await?;
        if committed != expected {
            return Err(LoadError::RowCountMismatch {
                expected,
                actual: committed,
            });
        }

        self.batch.clear();
        self.rows_inserted += committed;
        self.flushes.push(committed as usize);

        let sample = self.sampler.sample();
        debug!(
            rows_inserted = self.rows_inserted,
            memory_mb = sample.memory_mb,
            cpu_percent = sample.cpu_percent,
            "Batch sampled"
        );

        if self.rows_inserted - self.last_progress >= self.options.progress_interval {
            info!("Inserted {} rows", self.rows_inserted);
            self.last_progress = self.rows_inserted;
        }

        Ok(())
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "Run state");
        self.state = next;
    }
}
