//! Deadline enforcement and failure containment for one job run

use crate::core::job::current_thread_label;
use crate::core::{Job, Result, SharedJob, WorkError};
use crate::pool::worker::panic_message;
use crossbeam_channel::RecvTimeoutError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Deadline used when a job reports no usable timeout
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(5);

/// How a single run of a job ended
#[derive(Debug)]
pub enum JobOutcome {
    /// The body returned `Ok`
    Completed,
    /// The body overran its deadline
    TimedOut(Duration),
    /// The body returned an error or panicked
    Failed(WorkError),
}

impl JobOutcome {
    /// Whether the run completed successfully
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed)
    }
}

/// One binding of a job to its resolved deadline, alive for a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerInvocation {
    /// Correlation id for log lines
    pub id: Uuid,
    /// Resolved deadline
    pub deadline: Duration,
}

impl WorkerInvocation {
    fn new(deadline: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            deadline,
        }
    }
}

/// Runs a job under its deadline and absorbs every failure
///
/// Whatever happens to the body, the job ends up processed and the caller
/// never sees the job's error.
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use work_house::prelude::*;
///
/// struct Boom {
///     state: JobState,
/// }
///
/// impl Job for Boom {
///     fn name(&self) -> Option<&str> {
///         Some("boom")
///     }
///
///     fn timeout(&self) -> Option<Duration> {
///         Some(Duration::from_secs(1))
///     }
///
///     fn execute(&self) -> Result<()> {
///         Err(WorkError::job_runtime("boom", "Worker died"))
///     }
///
///     fn state(&self) -> &JobState {
///         &self.state
///     }
/// }
///
/// let job = Arc::new(Boom { state: JobState::new() });
/// let outcome = Worker::perform(job.clone());
///
/// assert!(!outcome.is_completed());
/// assert!(job.is_processed());
/// assert_eq!(job.state().failure_count(), 1);
/// ```
#[derive(Debug)]
pub struct Worker {
    job: SharedJob,
}

impl Worker {
    /// Bind a worker to a job
    pub fn new(job: SharedJob) -> Self {
        Self { job }
    }

    /// Bind a worker to a type-erased value
    ///
    /// # Errors
    ///
    /// Returns [`WorkError::InvalidArgument`] unless the value is a
    /// [`SharedJob`].
    pub fn from_any(candidate: Box<dyn Any + Send>) -> Result<Self> {
        candidate
            .downcast::<SharedJob>()
            .map(|job| Self::new(*job))
            .map_err(|_| WorkError::invalid_argument("job", "value does not implement Job"))
    }

    /// Run `job` once under its deadline
    pub fn perform(job: SharedJob) -> JobOutcome {
        Self::new(job).process_job()
    }

    /// The job this worker runs
    pub fn job(&self) -> &SharedJob {
        &self.job
    }

    /// Deadline for this run: the job's own, or [`DEFAULT_JOB_TIMEOUT`]
    pub fn timeout(&self) -> Duration {
        match self.job.timeout() {
            Some(timeout) if !timeout.is_zero() => timeout,
            _ => {
                log::debug!(
                    "{} No job specific timeout. Using default: {:?}",
                    self.current_worker(),
                    DEFAULT_JOB_TIMEOUT
                );
                DEFAULT_JOB_TIMEOUT
            }
        }
    }

    /// Run the job and contain its outcome
    pub fn process_job(&self) -> JobOutcome {
        let invocation = WorkerInvocation::new(self.timeout());
        let job_name = self.job.name().unwrap_or("<unnamed>").to_string();

        #[cfg(feature = "tracing")]
        let span = tracing::debug_span!(
            "job_invocation",
            job = %job_name,
            invocation = %invocation.id
        );
        #[cfg(feature = "tracing")]
        let _span_guard = span.enter();

        let _processed = MarkProcessedOnDrop(self.job.as_ref());
        log::debug!(
            "{} Beginning work on {} ({})",
            self.current_worker(),
            job_name,
            invocation.id
        );
        self.job.mark_processing();

        let start = Instant::now();
        let outcome = self.run_with_deadline(&invocation, &job_name);

        match &outcome {
            JobOutcome::Completed => {
                log::debug!(
                    "{} Worker done work in {}ms",
                    self.current_worker(),
                    start.elapsed().as_millis()
                );
            }
            JobOutcome::TimedOut(_) => {
                log::debug!(
                    "{} Overrunning body returned after {}ms",
                    self.current_worker(),
                    start.elapsed().as_millis()
                );
            }
            JobOutcome::Failed(err) => {
                self.job.log_failure(err);
                log::warn!("{} Worker died: {}...", self.current_worker(), err);
            }
        }

        outcome
    }

    /// Run the body on its own thread and wait for it under the deadline
    ///
    /// An overrun is logged on the job as soon as the deadline passes. The
    /// body cannot be pre-empted, so the worker then waits for it to return
    /// and the job stays processing until it does.
    fn run_with_deadline(&self, invocation: &WorkerInvocation, job_name: &str) -> JobOutcome {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let job = Arc::clone(&self.job);

        let runner = thread::Builder::new()
            .name(format!("{}/job", current_thread_label()))
            .spawn(move || {
                let result = catch_unwind(AssertUnwindSafe(|| job.perform()))
                    .map_err(|payload| panic_message(payload.as_ref()));
                let _ = tx.send(result);
            });
        let runner = match runner {
            Ok(handle) => handle,
            Err(e) => {
                return JobOutcome::Failed(WorkError::spawn_with_source(
                    0,
                    "Failed to spawn job runner",
                    e,
                ))
            }
        };

        match rx.recv_timeout(invocation.deadline) {
            Ok(result) => {
                let _ = runner.join();
                match result {
                    Ok(Ok(())) => JobOutcome::Completed,
                    Ok(Err(err)) => JobOutcome::Failed(err),
                    Err(panic_msg) => {
                        JobOutcome::Failed(WorkError::job_runtime(job_name, panic_msg))
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let err = WorkError::timed_out(job_name, invocation.deadline.as_millis() as u64);
                self.job.log_failure(&err);
                log::warn!("{} Worker expired: {}...", self.current_worker(), err);

                if runner.join().is_err() {
                    log::error!("{} Job runner for {} panicked", self.current_worker(), job_name);
                }
                JobOutcome::TimedOut(invocation.deadline)
            }
            Err(RecvTimeoutError::Disconnected) => JobOutcome::Failed(WorkError::job_runtime(
                job_name,
                "job runner exited without reporting",
            )),
        }
    }

    fn current_worker(&self) -> String {
        format!("Worker (t{})", current_thread_label())
    }
}

/// Marks the job processed when the run ends, however it ends
struct MarkProcessedOnDrop<'a>(&'a dyn Job);

impl Drop for MarkProcessedOnDrop<'_> {
    fn drop(&mut self) {
        self.0.mark_processed();
        log::debug!(
            "Worker (t{}) done. performed: {}",
            current_thread_label(),
            self.0.is_processed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobState;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    enum Behavior {
        Succeed,
        Fail,
        Panic,
        Sleep(Duration),
    }

    struct ScriptedJob {
        timeout: Option<Duration>,
        behavior: Behavior,
        saw_processing: AtomicBool,
        runs: AtomicUsize,
        state: JobState,
    }

    impl ScriptedJob {
        fn new(behavior: Behavior) -> Arc<Self> {
            Self::with_timeout(behavior, Some(Duration::from_secs(5)))
        }

        fn with_timeout(behavior: Behavior, timeout: Option<Duration>) -> Arc<Self> {
            Arc::new(Self {
                timeout,
                behavior,
                saw_processing: AtomicBool::new(false),
                runs: AtomicUsize::new(0),
                state: JobState::new(),
            })
        }
    }

    impl Job for ScriptedJob {
        fn name(&self) -> Option<&str> {
            Some("scripted")
        }

        fn timeout(&self) -> Option<Duration> {
            self.timeout
        }

        fn execute(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.saw_processing
                .store(self.is_processing(), Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail => Err(WorkError::job_runtime("scripted", "Boom! Worker died")),
                Behavior::Panic => panic!("Intentional panic for testing"),
                Behavior::Sleep(d) => {
                    thread::sleep(d);
                    Ok(())
                }
            }
        }

        fn state(&self) -> &JobState {
            &self.state
        }
    }

    #[test]
    fn test_perform_success() {
        let job = ScriptedJob::new(Behavior::Succeed);
        let outcome = Worker::perform(job.clone());

        assert!(outcome.is_completed());
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert!(job.saw_processing.load(Ordering::SeqCst));
        assert!(job.is_processed());
        assert!(!job.is_processing());
        assert_eq!(job.state().failure_count(), 0);
    }

    #[test]
    fn test_perform_error_is_logged_on_job() {
        let job = ScriptedJob::new(Behavior::Fail);
        let outcome = Worker::perform(job.clone());

        assert!(matches!(
            outcome,
            JobOutcome::Failed(WorkError::JobRuntime { .. })
        ));
        assert!(job.is_processed());
        let failure = job.state().last_failure().expect("failure recorded");
        assert!(!failure.timed_out);
        assert!(failure.message.contains("Boom"));
    }

    #[test]
    fn test_perform_panic_is_contained() {
        let job = ScriptedJob::new(Behavior::Panic);
        let outcome = Worker::perform(job.clone());

        match outcome {
            JobOutcome::Failed(WorkError::JobRuntime { message, .. }) => {
                assert!(message.contains("Intentional panic"))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(job.is_processed());
        assert_eq!(job.state().failure_count(), 1);
    }

    #[test]
    fn test_perform_timeout_waits_for_body() {
        let job = ScriptedJob::with_timeout(
            Behavior::Sleep(Duration::from_millis(500)),
            Some(Duration::from_millis(50)),
        );
        let start = Instant::now();
        let outcome = Worker::perform(job.clone());

        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(matches!(outcome, JobOutcome::TimedOut(d) if d == Duration::from_millis(50)));
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert!(job.is_processed());
        let failure = job.state().last_failure().expect("failure recorded");
        assert!(failure.timed_out);
    }

    #[test]
    fn test_timeout_logged_while_body_still_running() {
        let job = ScriptedJob::with_timeout(
            Behavior::Sleep(Duration::from_millis(600)),
            Some(Duration::from_millis(50)),
        );
        let runner = {
            let job = Arc::clone(&job);
            thread::spawn(move || Worker::perform(job))
        };

        thread::sleep(Duration::from_millis(250));
        assert_eq!(job.state().failure_count(), 1);
        assert!(job.is_processing());

        let outcome = runner.join().expect("worker thread panicked");
        assert!(matches!(outcome, JobOutcome::TimedOut(_)));
        assert!(job.is_processed());
    }

    #[test]
    fn test_missing_timeout_uses_default_and_fails_configuration() {
        let job = ScriptedJob::with_timeout(Behavior::Succeed, None);
        let worker = Worker::new(job.clone());
        assert_eq!(worker.timeout(), DEFAULT_JOB_TIMEOUT);

        let outcome = worker.process_job();
        assert!(matches!(
            outcome,
            JobOutcome::Failed(WorkError::Configuration { .. })
        ));
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
        assert!(job.is_processed());
    }

    #[test]
    fn test_from_any() {
        let job: SharedJob = ScriptedJob::new(Behavior::Succeed);
        let worker = Worker::from_any(Box::new(job)).expect("job accepted");
        assert_eq!(worker.job().name(), Some("scripted"));

        let result = Worker::from_any(Box::new("foo"));
        assert!(matches!(result, Err(WorkError::InvalidArgument { .. })));
    }
}
