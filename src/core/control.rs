//! Process-wide cooperative stop flag
//!
//! A single flag governs every [`Manager`](crate::Manager) in the process.
//! The manager factory sets it, and a termination signal or a job body may
//! clear it. Running job bodies are never interrupted by it; they observe it
//! through [`Job::should_process`](crate::Job::should_process).

use std::sync::atomic::{AtomicBool, Ordering};

static PROCESSING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Whether managers may keep scheduling jobs
#[inline]
pub fn is_processing_enabled() -> bool {
    PROCESSING_ENABLED.load(Ordering::Acquire)
}

/// Flip the process-wide stop flag
pub fn set_processing_enabled(enabled: bool) {
    PROCESSING_ENABLED.store(enabled, Ordering::Release);
}

/// Serialises unit tests that clear the flag against those that read it
#[cfg(test)]
pub(crate) static TEST_FLAG_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());
