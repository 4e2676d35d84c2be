//! Termination signal trap
//!
//! The listener only flips the process-wide stop flag. Draining the pool is
//! left to [`Manager`](crate::Manager) teardown once `work()` has returned.

use crate::core::{control, Result, WorkError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the Ctrl+C / SIGTERM listener once per process
pub(crate) fn install() -> Result<()> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let spawned = thread::Builder::new()
        .name("work-house-signals".to_string())
        .spawn(|| {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::error!("Failed to start signal listener: {}", e);
                    return;
                }
            };
            runtime.block_on(shutdown_signal());
            on_termination();
        });

    match spawned {
        Ok(_) => Ok(()),
        Err(e) => {
            INSTALLED.store(false, Ordering::SeqCst);
            Err(WorkError::spawn_with_source(
                0,
                "Failed to spawn signal listener",
                e,
            ))
        }
    }
}

/// Stop fetching new work after a termination signal
fn on_termination() {
    control::set_processing_enabled(false);
    log::info!("Trapped termination signal...");
    log::info!("No more jobs will be processed");
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_is_idempotent() {
        install().expect("first install");
        install().expect("second install");
        assert!(INSTALLED.load(Ordering::SeqCst));
    }

    #[test]
    fn test_termination_clears_processing_flag() {
        let _guard = control::TEST_FLAG_LOCK.lock();
        control::set_processing_enabled(true);
        on_termination();
        assert!(!control::is_processing_enabled());
        control::set_processing_enabled(true);
    }
}
