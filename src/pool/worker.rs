//! Pool thread implementation

use crate::core::{Result, WorkError};
use crate::queue::{Message, Task, TaskQueue};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[cfg(feature = "tracing")]
use tracing::{debug, span, Level};

/// Statistics for a pool thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Total number of tasks run
    pub tasks_run: AtomicU64,
    /// Total number of tasks that panicked
    pub tasks_panicked: AtomicU64,
    /// Total time spent running tasks (microseconds)
    pub busy_time_us: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total tasks run
    pub fn get_tasks_run(&self) -> u64 {
        self.tasks_run.load(Ordering::Relaxed)
    }

    /// Get total tasks panicked
    pub fn get_tasks_panicked(&self) -> u64 {
        self.tasks_panicked.load(Ordering::Relaxed)
    }

    /// Get total busy time in microseconds
    pub fn get_busy_time_us(&self) -> u64 {
        self.busy_time_us.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> WorkerStatSnapshot {
        WorkerStatSnapshot {
            tasks_run: self.get_tasks_run(),
            tasks_panicked: self.get_tasks_panicked(),
            busy_time_us: self.get_busy_time_us(),
        }
    }
}

/// Serialisable copy of [`WorkerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStatSnapshot {
    /// Total tasks run
    pub tasks_run: u64,
    /// Total tasks that panicked
    pub tasks_panicked: u64,
    /// Total busy time in microseconds
    pub busy_time_us: u64,
}

/// Diagnostic record of a pool thread after it exited
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerExit {
    /// Index of the thread within its pool
    pub id: usize,
    /// Thread name
    pub name: String,
    /// Tasks the thread ran over its lifetime
    pub tasks_run: u64,
    /// Whether the thread itself died from a panic
    pub panicked: bool,
}

/// A pool thread draining a shared [`TaskQueue`]
#[derive(Debug)]
pub struct PoolWorker {
    id: usize,
    name: String,
    thread: Option<thread::JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl PoolWorker {
    /// Spawn a thread that runs tasks from `queue` until it pops
    /// [`Message::Terminate`]
    pub fn spawn(id: usize, name: String, queue: TaskQueue) -> Result<Self> {
        let stats = Arc::new(WorkerStats::new());
        let stats_clone = Arc::clone(&stats);

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                Self::run(id, queue, stats_clone);
            })
            .map_err(|e| WorkError::spawn_with_source(id, "Failed to spawn pool thread", e))?;

        Ok(Self {
            id,
            name,
            thread: Some(thread),
            stats,
        })
    }

    /// Get thread index
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get thread statistics
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Wait for the thread to exit
    pub fn join(mut self) -> WorkerExit {
        let panicked = match self.thread.take() {
            Some(thread) => thread.join().is_err(),
            None => false,
        };
        if panicked {
            log::error!("Pool thread {} panicked", self.name);
        }
        WorkerExit {
            id: self.id,
            name: self.name.clone(),
            tasks_run: self.stats.get_tasks_run(),
            panicked,
        }
    }

    /// A worker whose thread dies from a panic right away
    #[cfg(test)]
    pub(crate) fn spawn_panicking(id: usize, name: String) -> Self {
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(|| panic!("pool thread crashed"))
            .expect("Failed to spawn worker");
        Self {
            id,
            name,
            thread: Some(thread),
            stats: Arc::new(WorkerStats::new()),
        }
    }

    fn run(id: usize, queue: TaskQueue, stats: Arc<WorkerStats>) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "pool_thread", id = id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        log::debug!("Pool thread {} started", id);

        loop {
            match queue.pop() {
                Some(Message::Run(task)) => Self::run_task(id, task, &stats),
                Some(Message::Terminate) | None => break,
            }
        }

        #[cfg(feature = "tracing")]
        debug!(tasks_run = stats.get_tasks_run(), "pool thread exiting");
        log::debug!("Pool thread {} exiting", id);
    }

    /// Run one task; a panicking task never takes the thread down
    fn run_task(id: usize, task: Task, stats: &WorkerStats) {
        let start = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(task));

        stats.tasks_run.fetch_add(1, Ordering::Relaxed);
        stats
            .busy_time_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);

        if let Err(panic_info) = result {
            stats.tasks_panicked.fetch_add(1, Ordering::Relaxed);
            log::error!(
                "Pool thread {}: task panicked: {}",
                id,
                panic_message(panic_info.as_ref())
            );
        }
    }
}

impl Drop for PoolWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            log::debug!(
                "Pool thread {} dropped without join; it exits after its terminate message",
                self.name
            );
        }
    }
}

/// Render a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_worker_runs_tasks_until_terminated() {
        let queue = TaskQueue::unbounded();
        let worker = PoolWorker::spawn(0, "test-0".to_string(), queue.clone())
            .expect("Failed to spawn worker");
        assert_eq!(worker.id(), 0);
        assert_eq!(worker.name(), "test-0");

        let (tx, rx) = crossbeam_channel::unbounded();
        queue.push(Message::Run(Box::new(move || {
            tx.send(thread::current().name().map(str::to_string))
                .unwrap();
        })));

        let ran_on = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("task did not run");
        assert_eq!(ran_on.as_deref(), Some("test-0"));

        queue.push(Message::Terminate);
        let exit = worker.join();
        assert_eq!(exit.tasks_run, 1);
        assert!(!exit.panicked);
    }

    #[test]
    fn test_worker_survives_panicking_task() {
        let queue = TaskQueue::unbounded();
        let worker = PoolWorker::spawn(0, "test-0".to_string(), queue.clone())
            .expect("Failed to spawn worker");
        let stats = worker.stats();

        queue.push(Message::Run(Box::new(|| {
            panic!("Intentional panic for testing");
        })));
        queue.push(Message::Run(Box::new(|| {})));
        queue.push(Message::Terminate);

        let exit = worker.join();
        assert!(!exit.panicked);
        assert_eq!(exit.tasks_run, 2);
        assert_eq!(stats.get_tasks_panicked(), 1);
        assert_eq!(stats.snapshot().tasks_run, 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
    }
}
