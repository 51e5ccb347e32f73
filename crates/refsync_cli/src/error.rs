//! CLI error type.

use refsync_remote::RemoteError;
use refsync_store::StoreError;
use thiserror::Error;

/// Errors that stop a command before it produces a summary.
#[derive(Error, Debug)]
pub enum CliError {
    /// No endpoint was given on the command line or in the environment.
    #[error("remote endpoint required (--endpoint or REFSYNC_ENDPOINT)")]
    MissingEndpoint,

    /// The local store could not be opened.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The remote client could not be built.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The job scheduler failed.
    #[error("engine error: {0}")]
    Engine(#[from] refsync_engine::EngineError),

    /// A background job panicked or was cancelled.
    #[error("job failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A summary could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
