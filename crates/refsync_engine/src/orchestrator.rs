//! Runs reconcilers in dependency order and aggregates their reports.

use crate::catalog::CatalogConfig;
use crate::entity::EntityKind;
use crate::error::EngineResult;
use crate::graph::{TaskGraph, TaskOutcome};
use crate::reconcile::{Reconcile, ReconcileReport, Reconciler};
use crate::reconcilers::{
    AssetReconciler, CategoryReconciler, IssueReconciler, LocationReconciler, OperatorReconciler,
};
use chrono::{DateTime, Utc};
use refsync_remote::RemoteClient;
use refsync_store::Store;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{info, info_span, warn};
use uuid::Uuid;

/// Errors shown per entity in the text rendering of a summary.
const ERROR_PREVIEW: usize = 5;

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Size of the worker pool.
    pub workers: usize,
}

impl OrchestratorConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self { workers: 4 }
    }

    /// Sets the worker count (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Sums over every entity of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Rows created.
    pub created: u64,
    /// Rows updated.
    pub updated: u64,
    /// Errors recorded.
    pub errors: u64,
}

/// The result of one orchestrator run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    /// Run identifier, also attached to every log line of the run.
    pub run_id: Uuid,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub finished_at: DateTime<Utc>,
    /// False if any entity failed or any requested name was unknown.
    pub success: bool,
    /// Report of every entity that was scheduled.
    pub per_entity: BTreeMap<EntityKind, ReconcileReport>,
    /// Sums over `per_entity`.
    pub totals: Totals,
    /// Requested entity names that matched nothing.
    pub unknown: Vec<String>,
}

impl SyncSummary {
    fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        per_entity: BTreeMap<EntityKind, ReconcileReport>,
        unknown: Vec<String>,
    ) -> Self {
        let totals = per_entity.values().fold(Totals::default(), |acc, report| Totals {
            created: acc.created + report.created,
            updated: acc.updated + report.updated,
            errors: acc.errors + report.errors.len() as u64,
        });
        let success = unknown.is_empty() && per_entity.values().all(|r| r.success);

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            success,
            per_entity,
            totals,
            unknown,
        }
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "succeeded" } else { "failed" };
        writeln!(f, "Sync run {} {status}", self.run_id)?;

        for (kind, report) in &self.per_entity {
            let state = if report.skipped {
                "skipped"
            } else if report.success {
                "ok"
            } else {
                "failed"
            };
            writeln!(
                f,
                "  {kind:<10} {state:<8} created {}, updated {}, errors {}",
                report.created,
                report.updated,
                report.errors.len()
            )?;
            for error in report.errors.iter().take(ERROR_PREVIEW) {
                writeln!(f, "      - {error}")?;
            }
            if report.errors.len() > ERROR_PREVIEW {
                writeln!(f, "      ... and {} more", report.errors.len() - ERROR_PREVIEW)?;
            }
        }

        if !self.unknown.is_empty() {
            writeln!(f, "  Unknown entities: {}", self.unknown.join(", "))?;
        }
        write!(
            f,
            "  Total: created {}, updated {}, errors {}",
            self.totals.created, self.totals.updated, self.totals.errors
        )
    }
}

/// Schedules reconcilers over the entity dependency graph.
///
/// Independent entities run concurrently on a fixed pool; a dependent
/// entity runs only after its prerequisites succeeded and is reported as
/// skipped otherwise. Every run waits for all scheduled work.
pub struct SyncOrchestrator {
    reconcilers: BTreeMap<EntityKind, Arc<dyn Reconcile>>,
    graph: TaskGraph<EntityKind>,
    config: OrchestratorConfig,
}

impl SyncOrchestrator {
    /// Creates an orchestrator with the reconciler of every entity kind.
    pub fn new(
        store: Store,
        remote: RemoteClient,
        catalog: CatalogConfig,
        config: OrchestratorConfig,
    ) -> EngineResult<Self> {
        let reconcilers: Vec<Arc<dyn Reconcile>> = vec![
            Arc::new(Reconciler::new(
                LocationReconciler::new(catalog.clone()),
                remote.clone(),
                store.clone(),
            )),
            Arc::new(Reconciler::new(
                CategoryReconciler::new(catalog.clone()),
                remote.clone(),
                store.clone(),
            )),
            Arc::new(Reconciler::new(
                OperatorReconciler::new(catalog.clone()),
                remote.clone(),
                store.clone(),
            )),
            Arc::new(Reconciler::new(
                AssetReconciler::new(catalog.clone()),
                remote.clone(),
                store.clone(),
            )),
            Arc::new(Reconciler::new(IssueReconciler::new(catalog), remote, store)),
        ];
        Self::with_reconcilers(reconcilers, config)
    }

    /// Creates an orchestrator over an explicit set of reconcilers.
    ///
    /// Dependency edges come from [`EntityKind::dependencies`]; edges to
    /// kinds without a reconciler are dropped. A later reconciler for the
    /// same kind replaces an earlier one.
    pub fn with_reconcilers(
        reconcilers: Vec<Arc<dyn Reconcile>>,
        config: OrchestratorConfig,
    ) -> EngineResult<Self> {
        let reconcilers: BTreeMap<EntityKind, Arc<dyn Reconcile>> = reconcilers
            .into_iter()
            .map(|reconciler| (reconciler.kind(), reconciler))
            .collect();

        let graph = TaskGraph::new(reconcilers.keys().map(|kind| {
            let deps: Vec<EntityKind> = kind
                .dependencies()
                .iter()
                .copied()
                .filter(|dep| reconcilers.contains_key(dep))
                .collect();
            (*kind, deps)
        }))?;

        Ok(Self {
            reconcilers,
            graph,
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs every reconciler.
    pub fn run_all(&self) -> SyncSummary {
        self.run_graph(&self.graph, Vec::new())
    }

    /// Runs the reconcilers named in `names`.
    ///
    /// Names accept singular and plural aliases. Unknown names are listed
    /// in the summary and make it unsuccessful. Only edges between selected
    /// entities are honoured: a selected child runs against whatever
    /// parents are already stored.
    pub fn run_selected<S: AsRef<str>>(&self, names: &[S]) -> SyncSummary {
        let mut kinds = Vec::new();
        let mut unknown = Vec::new();
        for name in names {
            match name.as_ref().parse::<EntityKind>() {
                Ok(kind) if self.reconcilers.contains_key(&kind) => kinds.push(kind),
                _ => {
                    warn!(name = name.as_ref(), "Unknown entity");
                    unknown.push(name.as_ref().to_string());
                }
            }
        }
        self.run_subset(&kinds, unknown)
    }

    /// Runs the reconcilers of `kinds`.
    pub fn run_kinds(&self, kinds: &[EntityKind]) -> SyncSummary {
        self.run_subset(kinds, Vec::new())
    }

    fn run_subset(&self, kinds: &[EntityKind], unknown: Vec<String>) -> SyncSummary {
        let keep: BTreeSet<EntityKind> = kinds.iter().copied().collect();
        self.run_graph(&self.graph.induced(&keep), unknown)
    }

    fn run_graph(&self, graph: &TaskGraph<EntityKind>, unknown: Vec<String>) -> SyncSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("sync", run_id = %run_id);
        let _guard = span.enter();
        info!(
            entities = graph.len(),
            workers = self.config.workers,
            "Starting sync run"
        );

        let outcomes = graph.execute(
            self.config.workers,
            |kind| match self.reconcilers.get(&kind) {
                Some(reconciler) => reconciler.reconcile(),
                None => ReconcileReport::failed(kind, "no reconciler registered"),
            },
            |report| report.success,
        );

        let per_entity = outcomes
            .into_iter()
            .map(|(kind, outcome)| {
                let report = match outcome {
                    TaskOutcome::Completed(report) => report,
                    TaskOutcome::Panicked(message) => {
                        ReconcileReport::failed(kind, format!("reconciler panicked: {message}"))
                    }
                    TaskOutcome::Skipped {
                        failed_prerequisite,
                    } => ReconcileReport::dependency_failed(kind, failed_prerequisite),
                };
                (kind, report)
            })
            .collect();

        let summary = SyncSummary::new(run_id, started_at, per_entity, unknown);
        info!(
            success = summary.success,
            created = summary.totals.created,
            updated = summary.totals.updated,
            errors = summary.totals.errors,
            "Sync run finished"
        );
        summary
    }
}

impl fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("entities", &self.graph.topological_order())
            .field("config", &self.config)
            .finish()
    }
}
