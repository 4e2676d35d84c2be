//! Repeatedly "fetches" mail for a handful of projects
//!
//! Some fetches are slow enough to be skipped on the next tick, some blow
//! up, and none of that stops the manager. Press Ctrl+C to stop.
//!
//! Run with: VERBOSE=1 cargo run --example fetch_mail

use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use work_house::prelude::*;

struct FetchIncomingEmailJob {
    name: String,
    state: JobState,
}

impl FetchIncomingEmailJob {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: JobState::new(),
        }
    }
}

impl Job for FetchIncomingEmailJob {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_secs(5))
    }

    fn execute(&self) -> Result<()> {
        let mut rng = rand::thread_rng();
        let emails = rng.gen_range(0..7);
        let how_long = Duration::from_millis(rng.gen_range(0..3_000));

        log::info!("[{}] Processing {} emails....", self.name, emails);
        for i in 0..emails {
            if !self.should_process() {
                log::info!("[{}] Exiting subjob processing loop", self.name);
                return Ok(());
            }
            log::debug!("[{}] processing: a_{}", self.name, i);
            if rng.gen_range(0..10) == 0 {
                return Err(WorkError::job_runtime(&self.name, "Boom! Worker died"));
            }
            thread::sleep(how_long);
            log::debug!("[{}] processed: a_{}", self.name, i);
        }
        Ok(())
    }

    fn state(&self) -> &JobState {
        &self.state
    }
}

/// Logging stays silent unless VERBOSE is set
fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "off"
    }
}

fn main() -> Result<()> {
    let level = log_filter(std::env::var_os("VERBOSE").is_some());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let projects: Vec<SharedJob> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|p| Arc::new(FetchIncomingEmailJob::new(p)) as SharedJob)
        .collect();

    let manager = Manager::work_on(projects, 3)?;
    Manager::trap_signals()?;
    manager.work()?;

    println!("Stopped after {} runs ({} skipped)", manager.runs(), manager.skipped());
    Ok(())
}
