//! The reconciler contract and its generic driver.
//!
//! Each entity kind implements [`EntityReconciler`]: how to fetch its
//! remote collection, how to decode one raw item, and how to upsert one
//! decoded item. [`Reconciler`] drives any implementation through the
//! same run: fetch, then decode and upsert item by item inside a single
//! transaction, with a savepoint per item.

use crate::decode::first_scalar;
use crate::entity::EntityKind;
use crate::error::{EngineError, EngineResult};
use refsync_remote::RemoteClient;
use refsync_store::{with_savepoint, Connection, Store};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

/// The remote collection of one entity kind, plus whatever side data
/// decoding needs (such as a status dictionary).
#[derive(Debug)]
pub struct RemoteBatch<C> {
    /// Raw items in remote order.
    pub items: Vec<Value>,
    /// Side data shared by every item of the run.
    pub context: C,
}

impl RemoteBatch<()> {
    /// Creates a batch without side data.
    pub fn plain(items: Vec<Value>) -> Self {
        Self { items, context: () }
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was inserted.
    Created,
    /// An existing row was updated or relinked.
    Updated,
    /// No local row matched and none may be created.
    Unmatched,
}

/// Per-entity reconciliation capabilities.
pub trait EntityReconciler: Send + Sync {
    /// A decoded remote item.
    type Item: fmt::Debug;
    /// Side data loaded once per run.
    type Context;

    /// Returns the entity kind.
    fn kind(&self) -> EntityKind;

    /// Fetches the full remote collection.
    fn fetch_remote(&self, remote: &RemoteClient) -> EngineResult<RemoteBatch<Self::Context>>;

    /// Decodes one raw item.
    ///
    /// Returns `Ok(None)` for items that are skipped with a warning and
    /// `Err` for items that are recorded as errors.
    fn decode_item(&self, raw: &Value, context: &Self::Context) -> EngineResult<Option<Self::Item>>;

    /// Creates or updates the local row for one item.
    fn upsert(&self, conn: &Connection, item: &Self::Item) -> EngineResult<UpsertOutcome>;
}

/// Result of one reconciler run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Entity kind.
    pub entity: EntityKind,
    /// False if the run failed or did not run.
    pub success: bool,
    /// Rows created.
    pub created: u64,
    /// Rows updated or relinked.
    pub updated: u64,
    /// Errors, per item or for the whole run.
    pub errors: Vec<String>,
    /// True if the run was skipped because a prerequisite failed.
    pub skipped: bool,
}

impl ReconcileReport {
    /// Creates an empty successful report.
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            success: true,
            created: 0,
            updated: 0,
            errors: Vec::new(),
            skipped: false,
        }
    }

    /// Creates a report for a run that failed as a whole.
    pub fn failed(entity: EntityKind, error: impl fmt::Display) -> Self {
        Self {
            success: false,
            errors: vec![error.to_string()],
            ..Self::new(entity)
        }
    }

    /// Creates a report for a run skipped because `prerequisite` failed.
    pub fn dependency_failed(entity: EntityKind, prerequisite: EntityKind) -> Self {
        Self {
            skipped: true,
            ..Self::failed(entity, EngineError::DependencyFailed { prerequisite })
        }
    }
}

/// An object-safe reconciler, as scheduled by the orchestrator.
pub trait Reconcile: Send + Sync {
    /// Returns the entity kind.
    fn kind(&self) -> EntityKind;

    /// Runs one reconciliation. Never panics on remote or store faults;
    /// they are reported in the result.
    fn reconcile(&self) -> ReconcileReport;
}

/// Generic reconciliation driver.
pub struct Reconciler<R> {
    inner: R,
    remote: RemoteClient,
    store: Store,
}

impl<R: EntityReconciler> Reconciler<R> {
    /// Creates a driver for `inner`.
    pub fn new(inner: R, remote: RemoteClient, store: Store) -> Self {
        Self {
            inner,
            remote,
            store,
        }
    }

    /// Returns the entity-specific part.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn run(&self) -> EngineResult<ReconcileReport> {
        let kind = self.inner.kind();
        let mut report = ReconcileReport::new(kind);

        // Fetch before opening the transaction so the write lock is only
        // held while applying.
        let batch = self.inner.fetch_remote(&self.remote)?;
        info!(count = batch.items.len(), "Fetched remote items");
        if batch.items.is_empty() {
            warn!("Remote collection is empty");
            return Ok(report);
        }

        let mut session = self.store.session()?;
        session.transaction(|tx| {
            for raw in &batch.items {
                let item = match self.inner.decode_item(raw, &batch.context) {
                    Ok(Some(item)) => item,
                    Ok(None) => continue,
                    Err(e) => {
                        record(&mut report, kind, raw, &e);
                        continue;
                    }
                };

                match with_savepoint(tx, "reconcile_item", || self.inner.upsert(tx, &item)) {
                    Ok(UpsertOutcome::Created) => {
                        debug!(?item, "Created");
                        report.created += 1;
                    }
                    Ok(UpsertOutcome::Updated) => {
                        debug!(?item, "Updated");
                        report.updated += 1;
                    }
                    Ok(UpsertOutcome::Unmatched) => {}
                    Err(e) => record(&mut report, kind, raw, &e),
                }
            }
            Ok::<_, EngineError>(())
        })?;

        Ok(report)
    }
}

fn record(report: &mut ReconcileReport, kind: EntityKind, raw: &Value, error: &EngineError) {
    let message = format!("{kind} {}: {error}", describe(raw));
    warn!("{message}");
    report.errors.push(message);
}

fn describe(raw: &Value) -> String {
    let name = first_scalar(raw.get("NAME")).unwrap_or_else(|| "<unnamed>".to_string());
    match first_scalar(raw.get("ID")) {
        Some(id) => format!("{name} (ID: {id})"),
        None => name,
    }
}

impl<R: EntityReconciler> Reconcile for Reconciler<R> {
    fn kind(&self) -> EntityKind {
        self.inner.kind()
    }

    fn reconcile(&self) -> ReconcileReport {
        let kind = self.inner.kind();
        let span = info_span!("reconcile", entity = %kind);
        let _guard = span.enter();
        let start = Instant::now();

        match self.run() {
            Ok(report) => {
                info!(
                    created = report.created,
                    updated = report.updated,
                    errors = report.errors.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Reconciliation finished"
                );
                report
            }
            Err(e) => {
                error!(error = %e, "Reconciliation failed, changes rolled back");
                ReconcileReport::failed(kind, e)
            }
        }
    }
}
