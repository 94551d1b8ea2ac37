//! Loadbench Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared pieces used by every loadbench workspace member:
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//! - **Results**: the JSON result record consumed by comparison dashboards
//!
//! # Example
//!
//! ```no_run
//! use loadbench_common::results::load_results;
//!
//! fn list(dir: &str) -> loadbench_common::Result<()> {
//!     for result in load_results(dir)? {
//!         println!("{} {:.0} rows/sec", result.db, result.rows_per_sec);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod results;

// Re-export commonly used types
pub use error::{CommonError, Result};
