//! Error types for the job engine

/// Result type for job engine operations
pub type Result<T> = std::result::Result<T, WorkError>;

/// Errors that can occur while configuring or running jobs
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WorkError {
    /// A job is missing one of its required members
    #[error("Job '{subject}' is misconfigured: {message}")]
    Configuration {
        /// Type or label of the offending job
        subject: String,
        /// Error message
        message: String,
    },

    /// A constructor was handed an unusable argument
    #[error("Invalid argument '{parameter}': {message}")]
    InvalidArgument {
        /// Argument name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Job exceeded its deadline
    #[error("Job '{job}' timed out after {timeout_ms}ms")]
    TimedOut {
        /// Label of the timed out job
        job: String,
        /// Deadline in milliseconds
        timeout_ms: u64,
    },

    /// Job body failed or panicked
    #[error("Job '{job}' failed: {message}")]
    JobRuntime {
        /// Label of the failed job
        job: String,
        /// Error message
        message: String,
    },

    /// Failed to spawn a thread with details
    #[error("Failed to spawn thread #{thread_id}: {message}")]
    Spawn {
        /// Index of the thread that failed to spawn
        thread_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a pool thread
    #[error("Failed to join pool thread #{thread_id}: {message}")]
    Join {
        /// Index of the thread that failed to join
        thread_id: usize,
        /// Error message
        message: String,
    },

    /// Work was scheduled on a pool that has been shut down
    #[error("Thread pool '{pool_name}' is not running")]
    NotRunning {
        /// Thread name prefix of the pool
        pool_name: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl WorkError {
    /// Create a configuration error
    pub fn configuration(subject: impl Into<String>, message: impl Into<String>) -> Self {
        WorkError::Configuration {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        WorkError::InvalidArgument {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timed_out(job: impl Into<String>, timeout_ms: u64) -> Self {
        WorkError::TimedOut {
            job: job.into(),
            timeout_ms,
        }
    }

    /// Create a job runtime error
    pub fn job_runtime(job: impl Into<String>, message: impl Into<String>) -> Self {
        WorkError::JobRuntime {
            job: job.into(),
            message: message.into(),
        }
    }

    /// Create a spawn error
    pub fn spawn(thread_id: usize, message: impl Into<String>) -> Self {
        WorkError::Spawn {
            thread_id,
            message: message.into(),
            source: None,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        WorkError::Spawn {
            thread_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_id: usize, message: impl Into<String>) -> Self {
        WorkError::Join {
            thread_id,
            message: message.into(),
        }
    }

    /// Create a not running error
    pub fn not_running(pool_name: impl Into<String>) -> Self {
        WorkError::NotRunning {
            pool_name: pool_name.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        WorkError::Other(msg.into())
    }

    /// Whether this error reports an exceeded deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkError::TimedOut { .. })
    }
}
