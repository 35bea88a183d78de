//! The task graph service.
//!
//! [`TaskGraphService`] ties the stores and configuration together. Its
//! operations are split across the `dependencies`, `hierarchy`,
//! `aggregation` and `bulk` modules.

use crate::config::TrellisConfig;
use crate::filter::DependencyFilter;
use crate::model::{DependencyId, Task, TaskDependency, TaskId};
use crate::store::{DependencyStore, TaskStore};
use crate::{Error, Result};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use trellis_graph::DependencyGraph;

/// Graph of blocking edges. Edges point from blocker to dependent and carry
/// the dependency id.
pub(crate) type BlockingGraph = DependencyGraph<(), DependencyId>;

/// Dependency, hierarchy and aggregation operations over a pair of stores.
///
/// Writes that must see a consistent graph (dependency creation, hierarchy
/// moves, bulk batches) run inside one critical section owned by the service.
/// Reads take no lock.
pub struct TaskGraphService<T, D> {
    pub(crate) tasks: Arc<T>,
    pub(crate) dependencies: Arc<D>,
    pub(crate) config: TrellisConfig,
    write_lock: Mutex<()>,
}

impl<T: TaskStore, D: DependencyStore> TaskGraphService<T, D> {
    /// Create a service over the given stores.
    pub fn new(tasks: Arc<T>, dependencies: Arc<D>, config: TrellisConfig) -> Self {
        Self {
            tasks,
            dependencies,
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// The task store.
    #[must_use]
    pub fn task_store(&self) -> &Arc<T> {
        &self.tasks
    }

    /// The dependency store.
    #[must_use]
    pub fn dependency_store(&self) -> &Arc<D> {
        &self.dependencies
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &TrellisConfig {
        &self.config
    }

    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock()
    }

    pub(crate) fn require_task(&self, id: &TaskId) -> Result<Task> {
        self.tasks
            .get_task(id)?
            .ok_or_else(|| Error::task_not_found(id))
    }

    /// Build the graph of every stored blocking edge.
    pub(crate) fn blocking_graph(&self) -> Result<BlockingGraph> {
        let edges = self.dependencies.list(&DependencyFilter::new().blocking())?;
        build_graph(&edges)
    }
}

/// Build a blocker-to-dependent graph over `edges`.
fn build_graph(edges: &[TaskDependency]) -> Result<BlockingGraph> {
    let mut graph = DependencyGraph::new();
    for edge in edges {
        graph.add_node(edge.blocking_task_id.as_str(), ());
        graph.add_node(edge.dependent_task_id.as_str(), ());
        graph.add_edge(
            edge.blocking_task_id.as_str(),
            edge.dependent_task_id.as_str(),
            edge.id.clone(),
        )?;
    }
    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Built blocking graph"
    );
    Ok(graph)
}
