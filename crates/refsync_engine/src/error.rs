//! Error types for the engine.

use crate::entity::EntityKind;
use refsync_remote::RemoteError;
use refsync_store::{ExternalKey, StoreError};
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while reconciling or exporting.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Remote API error.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A remote item or response had an unexpected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// A child item references a parent that is not stored locally.
    #[error("{parent} with external key {key} not found")]
    MissingParent {
        /// Kind of the missing parent.
        parent: EntityKind,
        /// External key that was looked up.
        key: ExternalKey,
    },

    /// A prerequisite reconciler failed, so this one did not run.
    #[error("skipped: prerequisite {prerequisite} failed")]
    DependencyFailed {
        /// The failed prerequisite.
        prerequisite: EntityKind,
    },

    /// The task graph contains a cycle.
    #[error("dependency cycle between: {0}")]
    Cycle(String),

    /// A task references a node that was never added.
    #[error("unknown dependency: {0}")]
    UnknownDependency(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Returns true if the underlying fault is a transient transport fault.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Remote(e) if e.is_transient())
    }
}
