//! Loadbench Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Measures how fast a delimited product file can be bulk-loaded into a
//! relational table, and what it costs the loading process in memory and CPU.
//!
//! # Pipeline
//!
//! - [`source::RecordSource`] streams raw rows from the CSV file, header skipped
//! - [`batch::BatchAccumulator`] buffers rows up to the configured batch size
//! - [`loader::BatchLoader`] persists each batch inside one transaction
//! - [`sampler::ResourceSampler`] takes one memory/CPU reading per batch
//! - [`coordinator::RunCoordinator`] drives the loop and builds the
//!   [`summary::RunSummary`]
//!
//! # Example
//!
//! ```no_run
//! use loadbench::config::BenchConfig;
//! use loadbench::coordinator::{RunCoordinator, RunOptions};
//! use loadbench::loader::SqlLoader;
//! use loadbench::sampler::{ProcessProbe, ResourceSampler};
//! use loadbench::source::RecordSource;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BenchConfig::load()?;
//!     let mut loader = SqlLoader::connect(&config.database_url, &config.table).await?;
//!     loader.truncate().await?;
//!
//!     let source = RecordSource::from_path(&config.csv_path)?;
//!     let sampler = ResourceSampler::new(ProcessProbe::new());
//!     let outcome = RunCoordinator::new(loader, sampler, RunOptions::from(&config))
//!         .run(source)
//!         .await?;
//!
//!     println!("{:.0} rows/sec", outcome.summary.rows_per_sec);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod loader;
pub mod record;
pub mod sampler;
pub mod source;
pub mod summary;

pub use error::{LoadError, Result};
