//! Thread pool and pool thread implementations

pub mod thread_pool;
pub mod worker;

pub use thread_pool::{PoolStats, ThreadPool, ThreadPoolConfig};
pub use worker::{PoolWorker, WorkerExit, WorkerStatSnapshot, WorkerStats};
