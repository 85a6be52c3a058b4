//! Schedule command implementation.
//!
//! A minimal periodic trigger. Runs execute one after another on this
//! thread, so they never overlap; a run that outlasts the interval delays
//! the next one instead of stacking up.

use crate::commands::run::{open_job, summary};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Runs the schedule command.
pub fn run(
    path: &Path,
    config_path: &Path,
    interval_secs: u64,
    runs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    if interval_secs == 0 {
        return Err("interval must be positive".into());
    }
    let interval = Duration::from_secs(interval_secs);
    let (job, config) = open_job(path, config_path)?;

    let mut completed = 0u64;
    loop {
        let started = Instant::now();
        let report = job.run(&config);
        println!("{}", summary(&report));
        completed += 1;

        if runs.is_some_and(|limit| completed >= limit) {
            break;
        }
        let next = interval.saturating_sub(started.elapsed());
        info!(next_run_in = ?next, "waiting for next run");
        thread::sleep(next);
    }

    let stats = job.stats();
    println!(
        "{} runs: {} completed, {} failed, {} users removed, {} groups created",
        completed, stats.runs_completed, stats.runs_failed, stats.users_removed, stats.groups_created
    );
    Ok(())
}
