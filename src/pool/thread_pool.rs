//! Thread pool implementation

use crate::core::{Result, WorkError};
use crate::pool::worker::{PoolWorker, WorkerExit, WorkerStatSnapshot, WorkerStats};
use crate::queue::{Message, TaskQueue};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Configuration for thread pool
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    /// Number of pool threads
    pub num_threads: usize,
    /// Thread name prefix
    pub thread_name_prefix: String,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: crate::system_info::processor_count(),
            thread_name_prefix: "work-house".to_string(),
        }
    }
}

impl ThreadPoolConfig {
    /// Create a new configuration with specified number of threads
    #[must_use]
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(WorkError::invalid_argument(
                "num_threads",
                "Number of threads must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Serialisable snapshot of a pool's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Number of pool threads
    pub threads: usize,
    /// Tasks scheduled so far
    pub scheduled: u64,
    /// Tasks waiting in the queue
    pub queued: usize,
    /// Per-thread counters
    pub workers: Vec<WorkerStatSnapshot>,
}

/// A fixed set of threads draining one unbounded FIFO queue
///
/// Threads are spawned on construction. [`schedule`](Self::schedule) never
/// blocks. [`shutdown`](Self::shutdown) pushes one terminate message per
/// thread behind any queued work and joins every thread; the pool cannot be
/// restarted afterwards.
///
/// # Example
///
/// ```rust
/// use work_house::ThreadPool;
///
/// # fn main() -> work_house::Result<()> {
/// let pool = ThreadPool::new(2)?;
/// pool.schedule(|| println!("do my job"))?;
/// pool.schedule_with(21, |n| println!("{}", n * 2))?;
///
/// let exits = pool.shutdown()?;
/// assert_eq!(exits.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct ThreadPool {
    config: ThreadPoolConfig,
    queue: TaskQueue,
    workers: Mutex<Vec<PoolWorker>>,
    stats: Vec<Arc<WorkerStats>>,
    running: AtomicBool,
    scheduled: AtomicU64,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("config", &self.config)
            .field("running", &self.running.load(Ordering::Relaxed))
            .field("scheduled", &self.scheduled.load(Ordering::Relaxed))
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl ThreadPool {
    /// Create a pool with `size` threads
    pub fn new(size: usize) -> Result<Self> {
        Self::with_config(ThreadPoolConfig::new(size))
    }

    /// Create a pool with custom configuration
    pub fn with_config(config: ThreadPoolConfig) -> Result<Self> {
        config.validate()?;

        let queue = TaskQueue::unbounded();
        let mut workers = Vec::with_capacity(config.num_threads);
        for id in 0..config.num_threads {
            let name = format!("{}-{}", config.thread_name_prefix, id);
            match PoolWorker::spawn(id, name, queue.clone()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    // Release the threads that did start before reporting.
                    for _ in 0..workers.len() {
                        queue.push(Message::Terminate);
                    }
                    for worker in workers {
                        worker.join();
                    }
                    return Err(e);
                }
            }
        }
        let stats = workers.iter().map(PoolWorker::stats).collect();

        log::info!(
            "Starting thread pool with {} threads...",
            config.num_threads
        );

        Ok(Self {
            config,
            queue,
            workers: Mutex::new(workers),
            stats,
            running: AtomicBool::new(true),
            scheduled: AtomicU64::new(0),
        })
    }

    /// Queue a closure for one of the pool threads
    ///
    /// # Errors
    ///
    /// Returns [`WorkError::NotRunning`] once the pool has been shut down.
    pub fn schedule<F>(&self, body: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.running.load(Ordering::Acquire) {
            return Err(WorkError::not_running(&self.config.thread_name_prefix));
        }
        self.queue.push(Message::Run(Box::new(body)));
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Queue a closure together with the argument it will be called with
    pub fn schedule_with<A, F>(&self, arg: A, body: F) -> Result<()>
    where
        A: Send + 'static,
        F: FnOnce(A) + Send + 'static,
    {
        self.schedule(move || body(arg))
    }

    /// Number of pool threads
    pub fn size(&self) -> usize {
        self.config.num_threads
    }

    /// Thread name prefix
    pub fn name(&self) -> &str {
        &self.config.thread_name_prefix
    }

    /// Whether the pool still accepts work
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Tasks scheduled so far
    pub fn scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    /// Tasks waiting in the queue (approximate)
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Get statistics for all threads
    pub fn get_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.stats.clone()
    }

    /// Snapshot of the pool's counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            threads: self.size(),
            scheduled: self.scheduled(),
            queued: self.queued(),
            workers: self.stats.iter().map(|s| s.snapshot()).collect(),
        }
    }

    /// Stop the pool and wait for every thread to exit
    ///
    /// Work queued before the call still runs, since the terminate messages
    /// queue up behind it. Returns one [`WorkerExit`] per thread; a second
    /// call returns an empty list.
    pub fn shutdown(&self) -> Result<Vec<WorkerExit>> {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(Vec::new());
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for _ in 0..workers.len() {
            self.queue.push(Message::Terminate);
        }

        let exits: Vec<WorkerExit> = workers.into_iter().map(PoolWorker::join).collect();
        log::info!("Thread pool '{}' shut down", self.config.thread_name_prefix);

        let panicked = exits.iter().filter(|exit| exit.panicked).count();
        if panicked > 0 {
            log::warn!(
                "Thread pool '{}': {} of {} threads panicked",
                self.config.thread_name_prefix,
                panicked,
                exits.len()
            );
        }
        Ok(exits)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if self.running.load(Ordering::Acquire) {
            if let Err(e) = self.shutdown() {
                log::error!(
                    "Failed to shut down thread pool '{}' during drop: {}",
                    self.config.thread_name_prefix,
                    e
                );
            }
        }
    }
}
