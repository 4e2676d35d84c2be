//! Convenient re-exports for common types and traits

pub use crate::core::{Job, JobState, Result, SharedJob, WorkError};
pub use crate::manager::{Manager, ManagerConfig};
pub use crate::pool::ThreadPool;
pub use crate::worker::{JobOutcome, Worker};
