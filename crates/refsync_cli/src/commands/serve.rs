//! Serve command implementation.
//!
//! Sync and export each run on their own interval. A job waits for its
//! previous run before the next tick is taken, so a job never overlaps
//! itself; the two jobs may overlap each other.

use super::{print_summary, Context};
use crate::error::CliError;
use crate::Outcome;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Runs both jobs until Ctrl-C.
pub fn run(
    runtime: &Runtime,
    context: Context,
    sync_every: Duration,
    export_every: Duration,
) -> Result<Outcome, CliError> {
    runtime.block_on(serve(context, sync_every, export_every))
}

async fn serve(
    context: Context,
    sync_every: Duration,
    export_every: Duration,
) -> Result<Outcome, CliError> {
    info!(
        sync_secs = sync_every.as_secs(),
        export_secs = export_every.as_secs(),
        "Scheduler started"
    );
    let format = context.format;

    let orchestrator = context.orchestrator.clone();
    let sync = tokio::spawn(every("sync", sync_every, move || {
        let summary = orchestrator.run_all();
        if let Err(e) = print_summary(&summary, format) {
            warn!(error = %e, "Cannot print sync summary");
        }
    }));

    let pipeline = context.pipeline.clone();
    let export = tokio::spawn(every("export", export_every, move || {
        let report = pipeline.run_export();
        if let Err(e) = print_summary(&report, format) {
            warn!(error = %e, "Cannot print export report");
        }
    }));

    let stopped = tokio::signal::ctrl_c().await;
    info!("Stopping scheduler");
    sync.abort();
    export.abort();
    stopped?;
    Ok(Outcome::Success)
}

async fn every<F>(job: &'static str, period: Duration, run: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let run = Arc::new(run);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let started = Instant::now();
        let run = run.clone();
        match tokio::task::spawn_blocking(move || run()).await {
            Ok(()) => info!(
                job,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Scheduled run finished"
            ),
            Err(e) => error!(job, error = %e, "Scheduled run panicked"),
        }
    }
}
