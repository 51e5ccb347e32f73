//! # refsync engine
//!
//! Reconciliation and export engine.
//!
//! This crate provides:
//! - A decoder for polymorphically shaped remote properties
//! - Per-entity reconcilers driven by one generic reconciliation driver
//! - A dependency-ordered task graph executed on a fixed worker pool
//! - The sync orchestrator that runs reconcilers and aggregates results
//! - The export pipeline that pushes pending submissions to the remote side
//!
//! ## Architecture
//!
//! ```text
//! SyncOrchestrator ──> TaskGraph ──> Reconciler<R> ──> RemoteClient
//!                                         │
//!                                         └──> Store (one session per run)
//!
//! ExportPipeline ──> RemoteClient (upload, submit)
//!        └────────> SubmissionQueue (delete on success) ──> attachments
//! ```
//!
//! ## Key Invariants
//!
//! - External keys are the join key; names are only a fallback
//! - A reconciler run commits once or not at all
//! - A failing item never aborts its siblings
//! - Dependents of a failed reconciler are skipped, not run
//! - Attachments are deleted only after their rows are deleted

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attachments;
mod catalog;
mod decode;
mod entity;
mod error;
mod export;
mod graph;
mod orchestrator;
mod reconcile;
mod reconcilers;

pub use attachments::{parse_file_names, resolve_file};
pub use catalog::{CatalogConfig, CategorySource, StaleLabelPolicy};
pub use decode::{element_id, element_name, first_key, first_scalar, DecodeDictionary, FieldValue};
pub use entity::{EntityKind, UnknownEntity};
pub use error::{EngineError, EngineResult};
pub use export::{
    idempotency_token, ExportConfig, ExportFields, ExportPipeline, ExportReport, StoreQueue,
    SubmissionQueue, SubmissionState,
};
pub use graph::{TaskGraph, TaskOutcome};
pub use orchestrator::{OrchestratorConfig, SyncOrchestrator, SyncSummary, Totals};
pub use reconcile::{
    EntityReconciler, Reconcile, ReconcileReport, Reconciler, RemoteBatch, UpsertOutcome,
};
pub use reconcilers::{
    AssetReconciler, CategoryReconciler, IssueReconciler, LocationReconciler, OperatorReconciler,
};
