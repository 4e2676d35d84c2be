//! Repeating job scheduler
//!
//! A [`Manager`] is not a queue. It re-evaluates a fixed list of jobs on
//! every tick, hands each idle job to its pool, pauses, and repeats until
//! the process-wide stop flag is cleared.
//!
//! ```rust,no_run
//! use work_house::prelude::*;
//!
//! # fn jobs() -> Vec<SharedJob> { Vec::new() }
//! # fn main() -> Result<()> {
//! let manager = Manager::work_on(jobs(), 3)?;
//! Manager::trap_signals()?;
//! manager.work()?;
//! # Ok(())
//! # }
//! ```

mod config;
#[cfg(feature = "signals")]
mod signals;

pub use config::{ManagerConfig, DEFAULT_INTERRUPT_SECS};

use crate::core::{control, Result, SharedJob};
use crate::pool::{ThreadPool, ThreadPoolConfig, WorkerExit};
use crate::worker::Worker;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Pool size for `job_count` jobs on `processors` logical cores
///
/// Never fewer threads than cores; grows to the quotient plus remainder of
/// `job_count / processors` when that is larger.
pub fn pool_size(job_count: usize, processors: usize) -> usize {
    let processors = processors.max(1);
    processors.max(job_count / processors + job_count % processors)
}

/// Drives a fixed list of jobs through a thread pool, tick after tick
///
/// Managers are only obtained through the factories, which also enable
/// processing for the whole process:
///
/// ```rust,compile_fail
/// use work_house::{Manager, ManagerConfig};
///
/// let manager = Manager::new(Vec::new(), ManagerConfig::new());
/// ```
pub struct Manager {
    jobs: Vec<SharedJob>,
    config: ManagerConfig,
    size: usize,
    pool: Mutex<Option<Arc<ThreadPool>>>,
    runs: AtomicU64,
    submitted: AtomicU64,
    skipped: AtomicU64,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("jobs", &self.jobs.len())
            .field("config", &self.config)
            .field("pool_size", &self.size)
            .field("runs", &self.runs())
            .finish()
    }
}

impl Manager {
    /// Create a manager pausing `interrupt_secs` between ticks
    ///
    /// # Errors
    ///
    /// Returns [`WorkError::InvalidArgument`](crate::WorkError::InvalidArgument)
    /// when `interrupt_secs` is zero.
    pub fn work_on<I>(jobs: I, interrupt_secs: u64) -> Result<Self>
    where
        I: IntoIterator<Item = SharedJob>,
    {
        Self::with_config(jobs, ManagerConfig::new().with_interrupt(interrupt_secs))
    }

    /// Create a manager with the default interrupt
    pub fn with_defaults<I>(jobs: I) -> Result<Self>
    where
        I: IntoIterator<Item = SharedJob>,
    {
        Self::with_config(jobs, ManagerConfig::default())
    }

    /// Create a manager from a full configuration
    pub fn with_config<I>(jobs: I, config: ManagerConfig) -> Result<Self>
    where
        I: IntoIterator<Item = SharedJob>,
    {
        config.validate()?;
        control::set_processing_enabled(true);
        Self::new(jobs.into_iter().collect(), config)
    }

    fn new(jobs: Vec<SharedJob>, config: ManagerConfig) -> Result<Self> {
        let size = pool_size(jobs.len(), config.processors());
        let manager = Self {
            jobs,
            config,
            size,
            pool: Mutex::new(None),
            runs: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        };
        manager.pool()?;
        Ok(manager)
    }

    /// Whether managers may keep scheduling jobs
    pub fn is_processing_enabled() -> bool {
        control::is_processing_enabled()
    }

    /// Flip the process-wide stop flag
    pub fn set_processing_enabled(enabled: bool) {
        control::set_processing_enabled(enabled);
    }

    /// Stop processing on Ctrl+C or SIGTERM
    #[cfg(feature = "signals")]
    pub fn trap_signals() -> Result<()> {
        signals::install()
    }

    /// The live pool, started on first use
    fn pool(&self) -> Result<Arc<ThreadPool>> {
        let mut slot = self.pool.lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(Arc::clone(pool));
        }
        let config = ThreadPoolConfig::new(self.size)
            .with_thread_name_prefix(self.config.thread_name_prefix.clone());
        let pool = Arc::new(ThreadPool::with_config(config)?);
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Run ticks until processing is disabled
    ///
    /// Each tick hands every job that is not already running to the pool,
    /// then pauses for the configured interrupt, re-checking the stop flag
    /// at every sleep step. Job failures never reach this loop.
    ///
    /// # Errors
    ///
    /// Only pool start-up failures are returned.
    pub fn work(&self) -> Result<()> {
        let pool = self.pool()?;
        log::info!("Processing jobs...");

        while control::is_processing_enabled() {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            log::debug!("RUN: {}", run);

            for job in &self.jobs {
                if !control::is_processing_enabled() {
                    log::info!("Stop fetching...");
                    return Ok(());
                }

                if job.is_processing() {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    log::info!(
                        "Job {} is still processing in run: {} ...skipping...",
                        job.name().unwrap_or("<unnamed>"),
                        run
                    );
                    continue;
                }

                pool.schedule_with(Arc::clone(job), |job: SharedJob| {
                    let thread = crate::core::job::current_thread_label();
                    let name = job.name().unwrap_or("<unnamed>").to_string();
                    log::debug!("Job {} started by thread {}", name, thread);
                    Worker::perform(job);
                    log::debug!("Job {} finished by thread {}", name, thread);
                })?;
                self.submitted.fetch_add(1, Ordering::Relaxed);
            }

            if !self.pause() {
                log::debug!("Interrupting sleep");
                return Ok(());
            }
            log::debug!("Next tick...");
        }

        Ok(())
    }

    /// Sleep for the interrupt in steps; `false` when stopped early
    fn pause(&self) -> bool {
        let total = self.config.interrupt();
        let step = self.config.sleep_step();
        let mut slept = Duration::ZERO;

        while slept < total {
            if !control::is_processing_enabled() {
                return false;
            }
            let nap = step.min(total - slept);
            thread::sleep(nap);
            slept += nap;
        }
        true
    }

    /// Shut down the current pool, if any
    ///
    /// A later [`work`](Self::work) starts a fresh pool.
    pub fn reset(&self) -> Result<Vec<WorkerExit>> {
        let pool = self.pool.lock().take();
        match pool {
            Some(pool) => pool.shutdown(),
            None => Ok(Vec::new()),
        }
    }

    /// Ticks started so far
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Job runs handed to the pool so far
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Jobs skipped because they were still running
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// The job list, in tick order
    pub fn jobs(&self) -> &[SharedJob] {
        &self.jobs
    }

    /// Pause between ticks
    pub fn interrupt(&self) -> Duration {
        self.config.interrupt()
    }

    /// Thread count of the live pool, if one exists
    pub fn pool_size(&self) -> Option<usize> {
        self.pool.lock().as_ref().map(|pool| pool.size())
    }

    /// The manager's configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if self.pool.lock().is_some() {
            log::info!("Exiting...shutting down pool...");
            if let Err(e) = self.reset() {
                log::error!("Failed to shut down pool during drop: {}", e);
            }
        }
    }
}
