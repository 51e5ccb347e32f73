//! CLI command implementations.

pub mod export;
pub mod serve;
pub mod sync;

use crate::error::CliError;
use crate::Format;
use refsync_engine::{
    CatalogConfig, ExportConfig, ExportPipeline, OrchestratorConfig, SyncOrchestrator,
};
use refsync_remote::{RemoteClient, RemoteConfig};
use refsync_store::{Store, StoreConfig};
use serde::Serialize;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Jobs shared by every command.
#[derive(Clone)]
pub struct Context {
    /// Reconciliation job.
    pub orchestrator: Arc<SyncOrchestrator>,
    /// Export job.
    pub pipeline: Arc<ExportPipeline>,
    /// Output format.
    pub format: Format,
}

impl Context {
    /// Opens the store and builds both jobs.
    pub fn open(
        endpoint: &str,
        database: &Path,
        upload_dir: &Path,
        workers: usize,
        format: Format,
    ) -> Result<Self, CliError> {
        let store = Store::open(StoreConfig::new(database))?;
        let remote = RemoteClient::with_reqwest(RemoteConfig::new(endpoint))?;
        info!(database = ?database, endpoint, "Opened refsync context");

        let orchestrator = SyncOrchestrator::new(
            store.clone(),
            remote.clone(),
            CatalogConfig::new(),
            OrchestratorConfig::new().with_workers(workers),
        )?;
        let pipeline = ExportPipeline::new(store, remote, ExportConfig::new(upload_dir));

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            pipeline: Arc::new(pipeline),
            format,
        })
    }
}

/// Prints a run summary in the requested format.
pub fn print_summary<T: Serialize + Display>(summary: &T, format: Format) -> Result<(), CliError> {
    match format {
        Format::Text => println!("{summary}"),
        Format::Json => println!("{}", serde_json::to_string_pretty(summary)?),
    }
    Ok(())
}

/// Runs `job` on a blocking thread until it finishes or Ctrl-C arrives.
///
/// Returns `None` when interrupted. The job is abandoned, not cancelled.
pub fn until_interrupted<T, F>(runtime: &Runtime, job: F) -> Result<Option<T>, CliError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    runtime.block_on(interruptible(tokio::task::spawn_blocking(job)))
}

async fn interruptible<T>(mut handle: JoinHandle<T>) -> Result<Option<T>, CliError> {
    tokio::select! {
        joined = &mut handle => Ok(Some(joined?)),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                warn!("Interrupted");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                Ok(Some(handle.await?))
            }
        },
    }
}
