//! Dependency-ordered task execution on a fixed worker pool.
//!
//! A [`TaskGraph`] is validated on construction: every dependency must be
//! a node of the graph and the graph must be acyclic. Execution hands
//! ready nodes to a pool of scoped worker threads; a node becomes ready
//! once all of its prerequisites completed successfully. When a node
//! fails, every node that depends on it, directly or transitively, is
//! skipped instead of run.

use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error, Span};

/// The result of one node of an executed graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<K, T> {
    /// The task ran and returned a value.
    Completed(T),
    /// The task panicked; carries the panic message.
    Panicked(String),
    /// The task did not run because a prerequisite did not succeed.
    Skipped {
        /// The prerequisite that failed or was itself skipped.
        failed_prerequisite: K,
    },
}

/// An acyclic graph of tasks keyed by `K`.
#[derive(Debug, Clone)]
pub struct TaskGraph<K> {
    dependencies: BTreeMap<K, Vec<K>>,
    dependents: BTreeMap<K, Vec<K>>,
    order: Vec<K>,
}

impl<K> TaskGraph<K>
where
    K: Copy + Ord + fmt::Display + Send + Sync,
{
    /// Builds a graph from `(node, dependencies)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownDependency`] if a dependency is not a
    /// node, and [`EngineError::Cycle`] if the graph has a cycle.
    pub fn new<I, D>(nodes: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = (K, D)>,
        D: IntoIterator<Item = K>,
    {
        let dependencies: BTreeMap<K, Vec<K>> = nodes
            .into_iter()
            .map(|(node, deps)| (node, deps.into_iter().collect()))
            .collect();

        let mut dependents: BTreeMap<K, Vec<K>> =
            dependencies.keys().map(|node| (*node, Vec::new())).collect();
        for (node, deps) in &dependencies {
            for dep in deps {
                dependents
                    .get_mut(dep)
                    .ok_or_else(|| EngineError::UnknownDependency(format!("{node} -> {dep}")))?
                    .push(*node);
            }
        }

        let order = topological_sort(&dependencies, &dependents)?;
        Ok(Self {
            dependencies,
            dependents,
            order,
        })
    }

    /// Returns the nodes with every node after its dependencies.
    pub fn topological_order(&self) -> &[K] {
        &self.order
    }

    /// Returns the dependencies of `node`.
    pub fn dependencies(&self, node: K) -> &[K] {
        self.dependencies.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Returns true if `node` is part of the graph.
    pub fn contains(&self, node: K) -> bool {
        self.dependencies.contains_key(&node)
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the subgraph induced by `keep`.
    ///
    /// Edges to nodes outside `keep` are dropped.
    pub fn induced(&self, keep: &BTreeSet<K>) -> Self {
        let dependencies: BTreeMap<K, Vec<K>> = self
            .dependencies
            .iter()
            .filter(|(node, _)| keep.contains(node))
            .map(|(node, deps)| {
                let deps = deps.iter().copied().filter(|d| keep.contains(d)).collect();
                (*node, deps)
            })
            .collect();
        let dependents = self
            .dependents
            .iter()
            .filter(|(node, _)| keep.contains(node))
            .map(|(node, deps)| {
                let deps = deps.iter().copied().filter(|d| keep.contains(d)).collect();
                (*node, deps)
            })
            .collect();
        let order = self
            .order
            .iter()
            .copied()
            .filter(|node| keep.contains(node))
            .collect();

        Self {
            dependencies,
            dependents,
            order,
        }
    }

    /// Runs every node on `workers` threads and waits for all of them.
    ///
    /// `run` is called once per node whose prerequisites all succeeded,
    /// with `succeeded` deciding whether a returned value counts as
    /// success. A panicking task counts as a failure. Independent nodes
    /// run concurrently and in no particular order.
    pub fn execute<T, R, S>(&self, workers: usize, run: R, succeeded: S) -> BTreeMap<K, TaskOutcome<K, T>>
    where
        T: Send,
        R: Fn(K) -> T + Sync,
        S: Fn(&T) -> bool,
    {
        let mut outcomes = BTreeMap::new();
        if self.order.is_empty() {
            return outcomes;
        }

        let workers = workers.clamp(1, self.order.len());
        let parent = Span::current();
        let (task_tx, task_rx) = mpsc::channel::<K>();
        let task_rx = Mutex::new(task_rx);
        let (done_tx, done_rx) = mpsc::channel::<(K, Result<T, String>)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let done_tx = done_tx.clone();
                let (task_rx, run, parent) = (&task_rx, &run, &parent);
                scope.spawn(move || {
                    let _guard = parent.enter();
                    loop {
                        let next = task_rx.lock().recv();
                        let Ok(node) = next else { break };
                        debug!(task = %node, "Task started");
                        let result = panic::catch_unwind(AssertUnwindSafe(|| run(node)))
                            .map_err(panic_message);
                        if done_tx.send((node, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(done_tx);

            let mut waiting: BTreeMap<K, usize> = self
                .dependencies
                .iter()
                .map(|(node, deps)| (*node, deps.len()))
                .collect();
            let mut in_flight = 0usize;
            for node in &self.order {
                if waiting.get(node) == Some(&0) && task_tx.send(*node).is_ok() {
                    in_flight += 1;
                }
            }

            while in_flight > 0 {
                let Ok((node, result)) = done_rx.recv() else {
                    break;
                };
                in_flight -= 1;

                let outcome = match result {
                    Ok(value) => TaskOutcome::Completed(value),
                    Err(message) => {
                        error!(task = %node, panic = %message, "Task panicked");
                        TaskOutcome::Panicked(message)
                    }
                };
                let ok = matches!(&outcome, TaskOutcome::Completed(value) if succeeded(value));
                outcomes.insert(node, outcome);

                for &dependent in self.dependents.get(&node).map_or(&[][..], Vec::as_slice) {
                    if !ok {
                        self.skip(dependent, node, &mut outcomes);
                        continue;
                    }
                    if let Some(count) = waiting.get_mut(&dependent) {
                        *count = count.saturating_sub(1);
                        if *count == 0
                            && !outcomes.contains_key(&dependent)
                            && task_tx.send(dependent).is_ok()
                        {
                            in_flight += 1;
                        }
                    }
                }
            }

            drop(task_tx);
        });

        outcomes
    }

    /// Marks `node` and everything downstream of it as skipped.
    fn skip<T>(&self, node: K, prerequisite: K, outcomes: &mut BTreeMap<K, TaskOutcome<K, T>>) {
        let mut stack = vec![(node, prerequisite)];
        while let Some((node, prerequisite)) = stack.pop() {
            if outcomes.contains_key(&node) {
                continue;
            }
            debug!(task = %node, prerequisite = %prerequisite, "Task skipped");
            outcomes.insert(
                node,
                TaskOutcome::Skipped {
                    failed_prerequisite: prerequisite,
                },
            );
            for &dependent in self.dependents.get(&node).map_or(&[][..], Vec::as_slice) {
                stack.push((dependent, node));
            }
        }
    }
}

/// Kahn's algorithm; ties are broken by key order.
fn topological_sort<K>(
    dependencies: &BTreeMap<K, Vec<K>>,
    dependents: &BTreeMap<K, Vec<K>>,
) -> EngineResult<Vec<K>>
where
    K: Copy + Ord + fmt::Display,
{
    let mut waiting: BTreeMap<K, usize> = dependencies
        .iter()
        .map(|(node, deps)| (*node, deps.len()))
        .collect();
    let mut ready: BTreeSet<K> = waiting
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| *node)
        .collect();

    let mut order = Vec::with_capacity(dependencies.len());
    while let Some(node) = ready.pop_first() {
        order.push(node);
        for dependent in dependents.get(&node).map_or(&[][..], Vec::as_slice) {
            if let Some(count) = waiting.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() != dependencies.len() {
        let sorted: BTreeSet<K> = order.iter().copied().collect();
        let cycle: Vec<String> = dependencies
            .keys()
            .filter(|node| !sorted.contains(node))
            .map(ToString::to_string)
            .collect();
        return Err(EngineError::Cycle(cycle.join(", ")));
    }

    Ok(order)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    fn chain() -> TaskGraph<&'static str> {
        TaskGraph::new([
            ("asset", vec!["location"]),
            ("location", vec![]),
            ("issue", vec!["category"]),
            ("category", vec![]),
            ("audit", vec!["asset"]),
        ])
        .unwrap()
    }

    fn position(order: &[&str], node: &str) -> usize {
        order.iter().position(|n| *n == node).unwrap()
    }

    #[test]
    fn order_puts_dependencies_first() {
        let graph = chain();
        let order = graph.topological_order();

        assert_eq!(order.len(), 5);
        assert!(position(order, "location") < position(order, "asset"));
        assert!(position(order, "asset") < position(order, "audit"));
        assert!(position(order, "category") < position(order, "issue"));
    }

    #[test]
    fn cycle_is_rejected() {
        let err = TaskGraph::new([("a", vec!["b"]), ("b", vec!["a"]), ("c", vec![])]).unwrap_err();
        match err {
            EngineError::Cycle(nodes) => assert_eq!(nodes, "a, b"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = TaskGraph::new([("a", vec!["missing"])]).unwrap_err();
        assert!(matches!(err, EngineError::UnknownDependency(ref s) if s == "a -> missing"));
    }

    #[test]
    fn failure_skips_transitive_dependents() {
        let graph = chain();
        let ran = Mutex::new(Vec::new());

        let outcomes = graph.execute(
            4,
            |node| {
                ran.lock().push(node);
                node != "location"
            },
            |ok| *ok,
        );

        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes["location"], TaskOutcome::Completed(false));
        assert_eq!(
            outcomes["asset"],
            TaskOutcome::Skipped {
                failed_prerequisite: "location"
            }
        );
        assert_eq!(
            outcomes["audit"],
            TaskOutcome::Skipped {
                failed_prerequisite: "asset"
            }
        );
        assert_eq!(outcomes["issue"], TaskOutcome::Completed(true));

        let mut ran = ran.into_inner();
        ran.sort_unstable();
        assert_eq!(ran, vec!["category", "issue", "location"]);
    }

    #[test]
    fn panic_is_reported_and_does_not_stall() {
        let graph = chain();

        let outcomes = graph.execute(
            2,
            |node| {
                if node == "category" {
                    panic!("boom");
                }
                node.len()
            },
            |_| true,
        );

        assert_eq!(outcomes["category"], TaskOutcome::Panicked("boom".into()));
        assert_eq!(
            outcomes["issue"],
            TaskOutcome::Skipped {
                failed_prerequisite: "category"
            }
        );
        assert_eq!(outcomes["audit"], TaskOutcome::Completed(5));
    }

    #[test]
    fn dependents_start_after_prerequisites_finish() {
        let graph = chain();
        let log = Mutex::new(Vec::new());

        graph.execute(
            4,
            |node| {
                log.lock().push(format!("start {node}"));
                log.lock().push(format!("end {node}"));
            },
            |_| true,
        );

        let log = log.into_inner();
        let at = |entry: &str| log.iter().position(|e| e == entry).unwrap();
        assert!(at("end location") < at("start asset"));
        assert!(at("end asset") < at("start audit"));
        assert!(at("end category") < at("start issue"));
    }

    #[test]
    fn independent_tasks_run_concurrently() {
        let graph = TaskGraph::new([("a", vec![]), ("b", vec![])]).unwrap();
        let barrier = Barrier::new(2);

        // Both tasks block until the other arrives, so this only finishes
        // if they run at the same time.
        let outcomes = graph.execute(
            2,
            |_| {
                barrier.wait();
            },
            |_| true,
        );

        assert_eq!(outcomes.len(), 2);
    }

    #[test]
    fn induced_subgraph_drops_outside_edges() {
        let graph = chain();
        let keep: BTreeSet<&str> = ["asset", "audit"].into_iter().collect();
        let sub = graph.induced(&keep);

        assert_eq!(sub.topological_order(), &["asset", "audit"]);
        assert!(sub.dependencies("asset").is_empty());
        assert_eq!(sub.dependencies("audit"), &["asset"]);
        assert!(!sub.contains("location"));
    }
}
