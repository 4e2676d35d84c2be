//! # Work House
//!
//! A repeating, timeout-enforcing job execution engine on a fixed-size thread pool.
//!
//! This is not a queue system. A [`Manager`] holds a fixed list of jobs and,
//! on every tick, hands each job that is not still running to its pool. It
//! then pauses for an interruptible interval and ticks again until the
//! process-wide stop flag is cleared by a termination signal or by a job.
//!
//! ## Features
//!
//! - **Thread Pool**: fixed set of named threads draining an unbounded FIFO queue
//! - **Job Contract**: a trait plus an embedded state machine (processing / processed)
//! - **Deadlines**: every run is bounded by the job's timeout
//! - **Containment**: job errors, panics and timeouts never reach a pool thread or the tick loop
//! - **Cooperative Stop**: one process-wide flag, trapped from Ctrl+C / SIGTERM
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use work_house::prelude::*;
//!
//! struct Report {
//!     state: JobState,
//! }
//!
//! impl Job for Report {
//!     fn name(&self) -> Option<&str> {
//!         Some("report")
//!     }
//!
//!     fn timeout(&self) -> Option<Duration> {
//!         Some(Duration::from_secs(2))
//!     }
//!
//!     fn execute(&self) -> Result<()> {
//!         println!("reporting");
//!         // Stop the whole manager once this run is done.
//!         Manager::set_processing_enabled(false);
//!         Ok(())
//!     }
//!
//!     fn state(&self) -> &JobState {
//!         &self.state
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let job = Arc::new(Report { state: JobState::new() });
//! let config = ManagerConfig::new()
//!     .with_interrupt(1)
//!     .with_sleep_step(Duration::from_millis(50));
//! let manager = Manager::with_config(vec![job.clone() as SharedJob], config)?;
//!
//! manager.work()?;
//! manager.reset()?;
//!
//! assert_eq!(manager.runs(), 1);
//! assert!(job.is_processed());
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Log lines go through the [`log`] facade. Install any logger, for example
//! `env_logger`, to see them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod manager;
pub mod pool;
pub mod prelude;
pub mod queue;
pub mod system_info;
pub mod worker;

pub use crate::core::{Job, JobFailure, JobState, Result, SharedJob, WorkError};
pub use crate::manager::{pool_size, Manager, ManagerConfig};
pub use crate::pool::{PoolStats, ThreadPool, ThreadPoolConfig, WorkerExit, WorkerStats};
pub use crate::worker::{JobOutcome, Worker, WorkerInvocation, DEFAULT_JOB_TIMEOUT};
