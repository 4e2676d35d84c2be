//! Job trait and the state machine every job embeds

use crate::core::control;
use crate::core::error::{Result, WorkError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const IDLE: u8 = 0;
const PROCESSING: u8 = 1;
const PROCESSED: u8 = 2;

/// A failure recorded against a job by [`Job::log_failure`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    /// Label of the job that failed
    pub job: String,
    /// Name of the thread that observed the failure
    pub thread: String,
    /// Rendered error
    pub message: String,
    /// Whether the failure was an exceeded deadline
    pub timed_out: bool,
    /// When the failure was recorded
    pub at: DateTime<Utc>,
}

/// Processing state shared by every job
///
/// Embed one by value in each concrete job and return it from
/// [`Job::state`]. The phase is a single atomic, so `processing` and
/// `processed` can never both be observed as set.
#[derive(Debug, Default)]
pub struct JobState {
    phase: AtomicU8,
    failures: AtomicU64,
    last_failure: Mutex<Option<JobFailure>>,
}

impl JobState {
    /// Create a fresh, idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the job is currently running
    pub fn is_processing(&self) -> bool {
        self.phase.load(Ordering::Acquire) == PROCESSING
    }

    /// Whether the job finished its latest run
    pub fn is_processed(&self) -> bool {
        self.phase.load(Ordering::Acquire) == PROCESSED
    }

    /// Set processing, clear processed
    pub fn mark_processing(&self) {
        self.phase.store(PROCESSING, Ordering::Release);
    }

    /// Set processed, clear processing
    pub fn mark_processed(&self) {
        self.phase.store(PROCESSED, Ordering::Release);
    }

    /// Number of failures recorded so far
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Most recent failure, if any
    pub fn last_failure(&self) -> Option<JobFailure> {
        self.last_failure.lock().clone()
    }

    fn record_failure(&self, failure: JobFailure) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock() = Some(failure);
    }
}

/// A repeatable unit of work driven by a [`Manager`](crate::Manager)
///
/// Implementors supply an identity, a deadline, the work body and access to
/// their embedded [`JobState`]. Everything else is provided.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use work_house::prelude::*;
///
/// struct Ping {
///     state: JobState,
/// }
///
/// impl Job for Ping {
///     fn name(&self) -> Option<&str> {
///         Some("ping")
///     }
///
///     fn timeout(&self) -> Option<Duration> {
///         Some(Duration::from_secs(1))
///     }
///
///     fn execute(&self) -> Result<()> {
///         Ok(())
///     }
///
///     fn state(&self) -> &JobState {
///         &self.state
///     }
/// }
///
/// let job = Ping { state: JobState::new() };
/// assert_eq!(job.label().unwrap(), "ping");
/// assert!(job.perform().is_ok());
/// ```
pub trait Job: Send + Sync {
    /// Identity of the job; must be present and non-empty
    fn name(&self) -> Option<&str>;

    /// Deadline for one run; must be present and non-zero
    fn timeout(&self) -> Option<Duration>;

    /// The work body
    ///
    /// Long bodies may poll [`should_process`](Job::should_process) to stop
    /// early.
    ///
    /// # Errors
    ///
    /// Any error is contained by the [`Worker`](crate::Worker) running the job.
    fn execute(&self) -> Result<()>;

    /// The embedded state machine
    fn state(&self) -> &JobState;

    /// Type name used in log lines and configuration errors
    fn job_type(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Validate the contract, then run the body
    fn perform(&self) -> Result<()> {
        self.require_name()?;
        self.require_timeout()?;
        self.execute()
    }

    /// Display label of the job; fails like [`perform`](Job::perform) on an
    /// incomplete job
    fn label(&self) -> Result<String> {
        let name = self.require_name()?;
        self.require_timeout()?;
        Ok(name.to_string())
    }

    /// The job's name, or a configuration error
    fn require_name(&self) -> Result<&str> {
        match self.name() {
            Some(name) if !name.trim().is_empty() => Ok(name),
            _ => Err(WorkError::configuration(
                self.job_type(),
                "jobs require a non-empty 'name'",
            )),
        }
    }

    /// The job's deadline, or a configuration error
    fn require_timeout(&self) -> Result<Duration> {
        match self.timeout() {
            Some(timeout) if !timeout.is_zero() => Ok(timeout),
            _ => Err(WorkError::configuration(
                self.job_type(),
                "jobs require a positive 'timeout'",
            )),
        }
    }

    /// Whether the job is currently running
    fn is_processing(&self) -> bool {
        self.state().is_processing()
    }

    /// Whether the job finished its latest run
    fn is_processed(&self) -> bool {
        self.state().is_processed()
    }

    /// Set processing, clear processed
    fn mark_processing(&self) {
        self.state().mark_processing();
    }

    /// Set processed, clear processing
    fn mark_processed(&self) {
        self.state().mark_processed();
    }

    /// Reads the process-wide stop flag
    fn should_process(&self) -> bool {
        control::is_processing_enabled()
    }

    /// Record an error tagged with this job and the current thread
    fn log_failure(&self, err: &WorkError) {
        let job = self.name().unwrap_or("<unnamed>").to_string();
        let thread = current_thread_label();
        log::warn!(
            "Job (t{}) [{}: {}] logging exception: {}",
            thread,
            self.job_type(),
            job,
            err
        );
        self.state().record_failure(JobFailure {
            job,
            thread,
            message: err.to_string(),
            timed_out: err.is_timeout(),
            at: Utc::now(),
        });
    }
}

impl fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Job({}: {})",
            self.job_type(),
            self.name().unwrap_or("<unnamed>")
        )
    }
}

/// A job handle shared between the caller, the manager and pool threads
pub type SharedJob = Arc<dyn Job>;

/// Name of the current thread, falling back to its id
pub(crate) fn current_thread_label() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", current.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestJob {
        name: Option<String>,
        timeout: Option<Duration>,
        state: JobState,
    }

    impl TestJob {
        fn new(name: Option<&str>, timeout: Option<Duration>) -> Self {
            Self {
                name: name.map(str::to_string),
                timeout,
                state: JobState::new(),
            }
        }
    }

    impl Job for TestJob {
        fn name(&self) -> Option<&str> {
            self.name.as_deref()
        }

        fn timeout(&self) -> Option<Duration> {
            self.timeout
        }

        fn execute(&self) -> Result<()> {
            Ok(())
        }

        fn state(&self) -> &JobState {
            &self.state
        }
    }

    #[test]
    fn test_perform_requires_name() {
        let job = TestJob::new(None, Some(Duration::from_secs(5)));
        assert!(matches!(
            job.perform(),
            Err(WorkError::Configuration { .. })
        ));

        let job = TestJob::new(Some("  "), Some(Duration::from_secs(5)));
        assert!(matches!(
            job.perform(),
            Err(WorkError::Configuration { .. })
        ));

        let job = TestJob::new(Some("foo"), Some(Duration::from_secs(5)));
        assert!(job.perform().is_ok());
    }

    #[test]
    fn test_perform_requires_timeout() {
        let job = TestJob::new(Some("foo"), None);
        assert!(matches!(
            job.perform(),
            Err(WorkError::Configuration { .. })
        ));

        let job = TestJob::new(Some("foo"), Some(Duration::ZERO));
        assert!(matches!(
            job.perform(),
            Err(WorkError::Configuration { .. })
        ));
    }

    #[test]
    fn test_label() {
        let job = TestJob::new(None, Some(Duration::from_secs(5)));
        assert!(matches!(job.label(), Err(WorkError::Configuration { .. })));

        let job = TestJob::new(Some("foo"), Some(Duration::from_secs(5)));
        assert_eq!(job.label().unwrap(), "foo");
    }

    #[test]
    fn test_state_transitions() {
        let job = TestJob::new(Some("foo"), Some(Duration::from_secs(5)));
        assert!(!job.is_processing());
        assert!(!job.is_processed());

        job.mark_processing();
        assert!(job.is_processing());
        assert!(!job.is_processed());

        job.mark_processed();
        assert!(job.is_processed());
        assert!(!job.is_processing());

        job.mark_processed();
        assert!(job.is_processed());
        assert!(!job.is_processing());

        job.mark_processing();
        job.mark_processing();
        assert!(job.is_processing());
        assert!(!job.is_processed());
    }

    #[test]
    fn test_log_failure_records_identity() {
        let job = TestJob::new(Some("foo"), Some(Duration::from_secs(5)));
        assert_eq!(job.state().failure_count(), 0);
        assert!(job.state().last_failure().is_none());

        job.log_failure(&WorkError::timed_out("foo", 10));

        let failure = job.state().last_failure().expect("failure recorded");
        assert_eq!(job.state().failure_count(), 1);
        assert_eq!(failure.job, "foo");
        assert_eq!(failure.thread, current_thread_label());
        assert!(failure.timed_out);
        assert!(failure.message.contains("timed out"));
    }

    #[test]
    fn test_debug_for_dyn_job() {
        let job: SharedJob = Arc::new(TestJob::new(Some("foo"), None));
        assert!(format!("{:?}", job).contains("foo"));
    }
}
